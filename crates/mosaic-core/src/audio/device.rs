//! Output device lookup

use cpal::traits::{DeviceTrait, HostTrait};

use super::error::{AudioError, AudioResult};

/// Names of every output device on the default host
pub fn output_device_names() -> AudioResult<Vec<String>> {
    let host = cpal::default_host();
    let names: Vec<String> = host
        .output_devices()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .filter_map(|d| d.name().ok())
        .collect();

    if names.is_empty() {
        return Err(AudioError::NoDevices);
    }
    Ok(names)
}

/// Find an output device by name, or the default one
pub fn find_output_device(name: Option<&str>) -> AudioResult<cpal::Device> {
    let host = cpal::default_host();
    match name {
        Some(name) => host
            .output_devices()
            .map_err(|e| AudioError::ConfigError(e.to_string()))?
            .find(|d| d.name().ok().as_deref() == Some(name))
            .ok_or_else(|| AudioError::DeviceNotFound(name.to_string())),
        None => host
            .default_output_device()
            .ok_or_else(|| AudioError::NoDefaultDevice("No default output device".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_enumeration() {
        // No devices is the normal case on CI machines
        match output_device_names() {
            Ok(names) => assert!(!names.is_empty()),
            Err(AudioError::NoDevices) | Err(AudioError::ConfigError(_)) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    #[test]
    fn test_unknown_device_is_not_found() {
        let result = find_output_device(Some("definitely-not-a-device-name"));
        assert!(result.is_err());
    }
}
