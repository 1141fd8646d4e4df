// Chooses the value for `{base_image}`.

use std::time::Duration;

use log::debug;
use subprocess::{Popen, PopenConfig, Redirection};

use super::config::Config;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const PYTHON_INTERPRETERS: [&str; 2] = ["python3", "python"];

pub fn supported_image(major: u32, minor: u32) -> Option<String> {
    match (major, minor) {
        (3, 8..=12) => Some(format!("python:{}.{}-slim", major, minor)),
        _ => None,
    }
}

// Parses the output of `python --version`, e.g. "Python 3.11.4".
pub fn parse_python_version(output: &str) -> Option<(u32, u32)> {
    let version = output.trim().strip_prefix("Python ")?;
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor: String = parts
        .next()?
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let minor = minor.parse().ok()?;
    Some((major, minor))
}

fn probe(interpreter: &str) -> Option<(u32, u32)> {
    let mut p = Popen::create(
        &[interpreter, "--version"],
        PopenConfig {
            stdout: Redirection::Pipe,
            stderr: Redirection::Pipe,
            ..Default::default()
        },
    )
    .ok()?;

    let output = p
        .communicate_start(None)
        .limit_time(PROBE_TIMEOUT)
        .read_string();
    let (stdout, stderr) = match output {
        Ok(output) => output,
        Err(e) => {
            debug!("Probing {} failed: {}", interpreter, e);
            let _ = p.terminate();
            return None;
        }
    };
    let _ = p.wait_timeout(PROBE_TIMEOUT);

    // Old interpreters print their version on stderr.
    [stdout, stderr]
        .iter()
        .flatten()
        .find_map(|text| parse_python_version(text))
}

pub fn detect_python_version() -> Option<(u32, u32)> {
    PYTHON_INTERPRETERS.iter().find_map(|interpreter| {
        let version = probe(interpreter);
        debug!("Local {} version: {:?}", interpreter, version);
        version
    })
}

pub fn resolve_base_image(pinned: Option<&str>, detected: Option<(u32, u32)>, fallback: &str) -> String {
    if let Some(image) = pinned {
        return image.to_string();
    }
    detected
        .and_then(|(major, minor)| supported_image(major, minor))
        .unwrap_or_else(|| fallback.to_string())
}

pub fn choose_base_image(config: &Config) -> String {
    let detected = if config.base_image.is_some() {
        None
    } else {
        detect_python_version()
    };
    let image = resolve_base_image(
        config.base_image.as_deref(),
        detected,
        &config.fallback_base_image,
    );
    debug!("Base image: {}", image);
    image
}
