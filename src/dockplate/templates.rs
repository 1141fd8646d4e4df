// Built-in descriptor templates. `{base_image}` and `{examples_copy}` are
// filled in per project; everything else is passed through untouched.
pub static TEMPLATE_DOCKERFILE: &str = r#"FROM {base_image}

# Geospatial system libraries
RUN apt-get update && apt-get install -y --no-install-recommends \
    gdal-bin \
    libgdal-dev \
    libproj-dev \
    libgeos-dev \
    build-essential \
    && rm -rf /var/lib/apt/lists/*

ENV CPLUS_INCLUDE_PATH=/usr/include/gdal
ENV C_INCLUDE_PATH=/usr/include/gdal
ENV PYTHONUNBUFFERED=1

WORKDIR /app

COPY requirements.txt .
RUN pip install --no-cache-dir GDAL==$(gdal-config --version) \
    && pip install --no-cache-dir -r requirements.txt

COPY gogogo.py .
COPY mc.json .
COPY model/ ./model/
{examples_copy}

EXPOSE 7860
CMD ["python", "gogogo.py"]
"#;

pub static TEMPLATE_DOCKERFILE_GPU: &str = r#"FROM nvidia/cuda:12.1.1-cudnn8-runtime-ubuntu22.04 AS cuda
FROM {base_image}

COPY --from=cuda /usr/local/cuda /usr/local/cuda
ENV PATH=/usr/local/cuda/bin:$PATH
ENV LD_LIBRARY_PATH=/usr/local/cuda/lib64
ENV NVIDIA_VISIBLE_DEVICES=all
ENV NVIDIA_DRIVER_CAPABILITIES=compute,utility

# Geospatial system libraries
RUN apt-get update && apt-get install -y --no-install-recommends \
    gdal-bin \
    libgdal-dev \
    libproj-dev \
    libgeos-dev \
    build-essential \
    && rm -rf /var/lib/apt/lists/*

ENV CPLUS_INCLUDE_PATH=/usr/include/gdal
ENV C_INCLUDE_PATH=/usr/include/gdal
ENV PYTHONUNBUFFERED=1

WORKDIR /app

COPY requirements.txt .
RUN pip install --no-cache-dir GDAL==$(gdal-config --version) \
    && pip install --no-cache-dir -r requirements.txt

COPY gogogo.py .
COPY mc.json .
COPY model/ ./model/
{examples_copy}

EXPOSE 7860
CMD ["python", "gogogo.py"]
"#;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavor {
    #[default]
    Cpu,
    Gpu,
}

impl Flavor {
    pub fn builtin_source(&self) -> &'static str {
        match self {
            Flavor::Cpu => TEMPLATE_DOCKERFILE,
            Flavor::Gpu => TEMPLATE_DOCKERFILE_GPU,
        }
    }

    pub fn builtin_label(&self) -> &'static str {
        match self {
            Flavor::Cpu => "<builtin:dockerfile.template>",
            Flavor::Gpu => "<builtin:dockerfile-gpu.template>",
        }
    }

    // File name looked up under a project's `.dockplate/` directory.
    pub fn project_template_name(&self) -> &'static str {
        match self {
            Flavor::Cpu => "dockerfile.template",
            Flavor::Gpu => "dockerfile-gpu.template",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_templates_differ_by_flavor() {
        assert_ne!(Flavor::Cpu.builtin_source(), Flavor::Gpu.builtin_source());
        assert!(Flavor::Gpu.builtin_source().contains("cuda"));
        assert!(!Flavor::Cpu.builtin_source().contains("cuda"));
    }

    #[test]
    fn test_project_template_names() {
        assert_eq!(Flavor::Cpu.project_template_name(), "dockerfile.template");
        assert_eq!(Flavor::Gpu.project_template_name(), "dockerfile-gpu.template");
    }
}
