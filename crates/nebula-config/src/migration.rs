//! Upgrades settings written by older engine versions.
//!
//! Rules run in ascending version order on the raw pairs read from a file,
//! before they reach the store. Each rule only matches the legacy shape it
//! rewrites, so running it again on migrated data changes nothing. Shapes a
//! rule does not recognize pass through untouched.

use std::collections::BTreeMap;

use crate::error::SettingsError;
use crate::value::Value;

/// Settings format version written by this build.
pub const CONFIG_VERSION: i64 = 5;

const INPUT_PREFIX: &str = "input/";

/// Deadzone given to input actions that predate per-action deadzones.
const LEGACY_DEADZONE: f64 = 0.5;

/// Device id of events that listened to the first device only.
const LEGACY_ALL_DEVICES: i64 = -1;
/// Device id meaning "every device".
pub const ALL_DEVICES: i64 = -3;

/// Rewrites `entries` from `from_version` to [`CONFIG_VERSION`].
///
/// # Errors
///
/// Returns [`SettingsError::NewerVersion`] if the data comes from a newer
/// engine.
pub fn migrate(from_version: i64, entries: &mut [(String, Value)]) -> Result<(), SettingsError> {
    if from_version > CONFIG_VERSION {
        return Err(SettingsError::NewerVersion {
            found: from_version,
            supported: CONFIG_VERSION,
        });
    }
    if from_version == CONFIG_VERSION {
        return Ok(());
    }

    log::info!("Migrating settings from config_version {from_version} to {CONFIG_VERSION}");

    for (name, value) in entries.iter_mut() {
        if !name.starts_with(INPUT_PREFIX) {
            continue;
        }
        if from_version <= 3 {
            wrap_action_list(value);
        }
        if from_version <= 4 {
            widen_event_devices(value);
        }
    }
    Ok(())
}

/// `[events...]` becomes `{"deadzone": 0.5, "events": [events...]}`.
fn wrap_action_list(value: &mut Value) {
    if let Value::Array(events) = value {
        let events = std::mem::take(events);
        let mut action = BTreeMap::new();
        action.insert("deadzone".to_string(), Value::Float(LEGACY_DEADZONE));
        action.insert("events".to_string(), Value::Array(events));
        *value = Value::Map(action);
    }
}

/// Events bound to device `-1` now listen to all devices.
fn widen_event_devices(value: &mut Value) {
    let Value::Map(action) = value else { return };
    let Some(Value::Array(events)) = action.get_mut("events") else {
        return;
    };
    for event in events {
        if let Value::Map(event) = event {
            if let Some(device) = event.get_mut("device") {
                if *device == Value::Int(LEGACY_ALL_DEVICES) {
                    *device = Value::Int(ALL_DEVICES);
                }
            }
        }
    }
}
