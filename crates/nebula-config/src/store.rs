//! The project settings store.
//!
//! [`ProjectSettings`] holds every setting in insertion order with its
//! metadata, resolves feature-tagged overrides, keeps the autoload and global
//! group tables in sync with the settings they are derived from, and owns the
//! [`ResourceFs`] that project files are loaded through.
//!
//! All state sits behind a single mutex that is held for one call at a time.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crossbeam_channel::Receiver;
use nebula_assets::{PackOverlay, ResourceFs};

use crate::error::SettingsError;
use crate::events::{EventBus, SettingsEvent};
use crate::key::SettingKey;
use crate::paths::{PathResolver, RES_SCHEME, simplify_path};
use crate::platform::Platform;
use crate::property::{PropertyInfo, PropertyUsage};
use crate::value::Value;

/// Pseudo-setting whose comma-separated value is merged into the custom features.
pub const CUSTOM_FEATURES_KEY: &str = "_custom_features";

const AUTOLOAD_PREFIX: &str = "autoload/";
const GLOBAL_GROUP_PREFIX: &str = "global_group/";

/// Orders below this are reserved for engine-declared defaults.
const NO_BUILTIN_ORDER_BASE: u64 = 1 << 16;

const DEFAULT_PROJECT_DATA_DIR_NAME: &str = ".nebula";

/// An autoload entry derived from an `autoload/<name>` setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoloadInfo {
    /// Node name (the part after `autoload/`).
    pub name: String,
    /// Simplified resource path, without the singleton marker.
    pub path: String,
    /// `true` if the setting value started with `*`.
    pub is_singleton: bool,
}

impl AutoloadInfo {
    fn from_value(name: &str, value: &Value) -> Self {
        let text = value.to_text();
        let (path, is_singleton) = match text.strip_prefix('*') {
            Some(rest) => (rest, true),
            None => (text.as_str(), false),
        };
        Self {
            name: name.to_string(),
            path: simplify_path(path),
            is_singleton,
        }
    }
}

#[derive(Debug, Clone)]
struct Setting {
    value: Value,
    initial: Option<Value>,
    order: u64,
    hidden_from_editor: bool,
    internal: bool,
    basic: bool,
    restart_if_changed: bool,
    ignore_value_in_docs: bool,
}

impl Setting {
    fn new(value: Value, order: u64) -> Self {
        Self {
            value,
            initial: None,
            order,
            hidden_from_editor: false,
            internal: false,
            basic: false,
            restart_if_changed: false,
            ignore_value_in_docs: false,
        }
    }

    fn is_changed(&self) -> bool {
        self.initial.as_ref() != Some(&self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FeatureOverride {
    tag: String,
    qualified: String,
}

#[derive(Debug, Default, PartialEq)]
struct SideTables {
    autoloads: BTreeMap<String, AutoloadInfo>,
    global_groups: BTreeMap<String, Value>,
}

impl SideTables {
    fn index(&mut self, name: &str, value: &Value) {
        if let Some(node) = side_table_name(name, AUTOLOAD_PREFIX) {
            self.autoloads
                .insert(node.to_string(), AutoloadInfo::from_value(node, value));
        } else if let Some(group) = side_table_name(name, GLOBAL_GROUP_PREFIX) {
            self.global_groups.insert(group.to_string(), value.clone());
        }
    }

    fn remove(&mut self, name: &str) -> Option<SettingsEvent> {
        if let Some(node) = side_table_name(name, AUTOLOAD_PREFIX) {
            self.autoloads
                .remove(node)
                .map(|_| SettingsEvent::AutoloadRemoved(node.to_string()))
        } else if let Some(group) = side_table_name(name, GLOBAL_GROUP_PREFIX) {
            self.global_groups
                .remove(group)
                .map(|_| SettingsEvent::GlobalGroupRemoved(group.to_string()))
        } else {
            None
        }
    }
}

fn side_table_name<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = name.strip_prefix(prefix)?;
    let entry = rest.split('/').next().unwrap_or(rest);
    (!entry.is_empty()).then_some(entry)
}

#[derive(Debug)]
struct StoreState {
    props: HashMap<String, Setting>,
    last_order: u64,
    last_builtin_order: u64,
    feature_overrides: HashMap<String, Vec<FeatureOverride>>,
    custom_features: BTreeSet<String>,
    hidden_prefixes: Vec<String>,
    custom_prop_info: HashMap<String, PropertyInfo>,
    tables: SideTables,
}

impl StoreState {
    fn new() -> Self {
        Self {
            props: HashMap::new(),
            last_order: NO_BUILTIN_ORDER_BASE,
            last_builtin_order: 0,
            feature_overrides: HashMap::new(),
            custom_features: BTreeSet::new(),
            hidden_prefixes: Vec::new(),
            custom_prop_info: HashMap::new(),
            tables: SideTables::default(),
        }
    }

    fn insert(&mut self, name: &str, value: Value) {
        self.tables.index(name, &value);

        if let Some(setting) = self.props.get_mut(name) {
            setting.value = value;
            return;
        }

        let key = SettingKey::parse(name);
        if key.is_override() {
            let overrides = self
                .feature_overrides
                .entry(key.base().to_string())
                .or_default();
            for tag in key.tags() {
                overrides.push(FeatureOverride {
                    tag: tag.clone(),
                    qualified: name.to_string(),
                });
            }
        }

        let order = self.last_order;
        self.last_order += 1;
        self.props.insert(name.to_string(), Setting::new(value, order));
    }

    fn erase(&mut self, name: &str) -> Option<SettingsEvent> {
        if self.props.remove(name).is_some() {
            let key = SettingKey::parse(name);
            if let Some(overrides) = self.feature_overrides.get_mut(key.base()) {
                overrides.retain(|o| o.qualified != name);
                if overrides.is_empty() {
                    self.feature_overrides.remove(key.base());
                }
            }
        }
        self.tables.remove(name)
    }

    fn merge_custom_features(&mut self, value: &Value) {
        for token in value.to_text().split(',') {
            let token = token.trim();
            if !token.is_empty() {
                self.custom_features.insert(token.to_string());
            }
        }
    }

    fn sorted(&self) -> Vec<(&String, &Setting)> {
        let mut entries: Vec<_> = self.props.iter().collect();
        entries.sort_by(|a, b| a.1.order.cmp(&b.1.order).then_with(|| a.0.cmp(b.0)));
        entries
    }

    fn derive_tables(&self) -> SideTables {
        let mut tables = SideTables::default();
        for (name, setting) in self.sorted() {
            tables.index(name, &setting.value);
        }
        tables
    }
}

/// Hierarchical, override-aware project settings.
pub struct ProjectSettings {
    platform: Arc<dyn Platform>,
    state: Mutex<StoreState>,
    changed: AtomicBool,
    events: EventBus,
    fs: ResourceFs,
    project_loaded: AtomicBool,
    project_data_dir_name: RwLock<String>,
}

impl ProjectSettings {
    /// Creates an empty store with its own pack overlay.
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self::with_overlay(platform, Arc::new(PackOverlay::new()))
    }

    /// Creates an empty store that mounts packs into `overlay`.
    pub fn with_overlay(platform: Arc<dyn Platform>, overlay: Arc<PackOverlay>) -> Self {
        Self {
            platform,
            state: Mutex::new(StoreState::new()),
            changed: AtomicBool::new(false),
            events: EventBus::default(),
            fs: ResourceFs::new(String::new(), overlay),
            project_loaded: AtomicBool::new(false),
            project_data_dir_name: RwLock::new(DEFAULT_PROJECT_DATA_DIR_NAME.to_string()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_setting(
        &self,
        name: &str,
        update: impl FnOnce(&mut Setting),
    ) -> Result<(), SettingsError> {
        let mut state = self.lock();
        match state.props.get_mut(name) {
            Some(setting) => {
                update(setting);
                Ok(())
            }
            None => Err(nonexistent(name)),
        }
    }

    fn read_setting<T>(&self, name: &str, read: impl FnOnce(&Setting) -> T) -> Result<T, SettingsError> {
        let state = self.lock();
        state.props.get(name).map(read).ok_or_else(|| nonexistent(name))
    }

    /// The host platform.
    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    /// The resource filesystem project files are read through.
    pub fn fs(&self) -> &ResourceFs {
        &self.fs
    }

    /// The pack overlay of [`Self::fs`].
    pub fn overlay(&self) -> &Arc<PackOverlay> {
        self.fs.overlay()
    }

    // --- Values ---

    /// Sets a setting. [`Value::Nil`] deletes it.
    ///
    /// The first insertion of a dotted name registers its feature overrides;
    /// `autoload/` and `global_group/` names update the side tables; the
    /// `_custom_features` pseudo-setting is merged instead of stored.
    pub fn set(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        let removed = {
            let mut state = self.lock();
            if value.is_nil() {
                state.erase(name)
            } else if name == CUSTOM_FEATURES_KEY {
                state.merge_custom_features(&value);
                None
            } else {
                state.insert(name, value);
                None
            }
        };
        if let Some(event) = removed {
            self.events.emit(event);
        }
        self.queue_changed();
    }

    /// Deletes a setting. Same as setting it to [`Value::Nil`].
    pub fn clear(&self, name: &str) {
        self.set(name, Value::Nil);
    }

    /// Exact lookup without override resolution.
    pub fn try_get(&self, name: &str) -> Option<Value> {
        self.lock().props.get(name).map(|s| s.value.clone())
    }

    /// Exact lookup. Logs a warning and returns [`Value::Nil`] if missing.
    pub fn get(&self, name: &str) -> Value {
        self.try_get(name).unwrap_or_else(|| {
            log::warn!("Property not found: {name}");
            Value::Nil
        })
    }

    /// Exact lookup with a fallback for missing settings.
    pub fn get_or(&self, name: &str, default: impl Into<Value>) -> Value {
        self.try_get(name).unwrap_or_else(|| default.into())
    }

    /// Returns `true` if the setting exists.
    pub fn has_setting(&self, name: &str) -> bool {
        self.lock().props.contains_key(name)
    }

    /// Lookup that prefers the first feature-tagged variant whose tag is
    /// active, falling back to `name` itself.
    pub fn try_get_with_override(&self, name: &str) -> Option<Value> {
        let state = self.lock();
        let target = state
            .feature_overrides
            .get(name)
            .and_then(|overrides| {
                overrides.iter().find(|o| {
                    self.feature_active(&state, &o.tag) && state.props.contains_key(&o.qualified)
                })
            })
            .map_or(name, |o| o.qualified.as_str());
        state.props.get(target).map(|s| s.value.clone())
    }

    /// Override-aware lookup. Logs a warning and returns [`Value::Nil`] if
    /// neither a variant nor the base setting exists.
    pub fn get_with_override(&self, name: &str) -> Value {
        self.try_get_with_override(name).unwrap_or_else(|| {
            log::warn!("Property not found: {name}");
            Value::Nil
        })
    }

    fn feature_active(&self, state: &StoreState, tag: &str) -> bool {
        state.custom_features.contains(tag) || self.platform.has_feature(tag)
    }

    /// Returns `true` if `tag` is a custom feature or reported by the platform.
    pub fn has_feature(&self, tag: &str) -> bool {
        let state = self.lock();
        self.feature_active(&state, tag)
    }

    /// Custom features declared through `_custom_features`, sorted.
    pub fn custom_features(&self) -> Vec<String> {
        self.lock().custom_features.iter().cloned().collect()
    }

    /// Declares an engine default: creates the setting if missing, records
    /// `default` as its initial value and moves it into the builtin order
    /// range. Returns the current value.
    pub fn define(&self, name: &str, default: impl Into<Value>) -> Value {
        let default = default.into();
        if !self.has_setting(name) {
            self.set(name, default.clone());
        }

        let mut guard = self.lock();
        let state = &mut *guard;
        let Some(setting) = state.props.get_mut(name) else {
            return default;
        };
        setting.initial = Some(default);
        if setting.order >= NO_BUILTIN_ORDER_BASE {
            setting.order = state.last_builtin_order;
            state.last_builtin_order += 1;
        }
        setting.value.clone()
    }

    // --- Metadata ---

    /// Records the value a setting reverts to.
    pub fn set_initial_value(&self, name: &str, value: impl Into<Value>) -> Result<(), SettingsError> {
        let value = value.into();
        self.update_setting(name, |s| s.initial = Some(value))
    }

    /// Marks a setting as requiring a restart when changed.
    pub fn set_restart_if_changed(&self, name: &str, restart: bool) -> Result<(), SettingsError> {
        self.update_setting(name, |s| s.restart_if_changed = restart)
    }

    /// Marks a setting as basic (shown without advanced mode).
    pub fn set_as_basic(&self, name: &str, basic: bool) -> Result<(), SettingsError> {
        self.update_setting(name, |s| s.basic = basic)
    }

    /// Marks a setting as internal.
    pub fn set_as_internal(&self, name: &str, internal: bool) -> Result<(), SettingsError> {
        self.update_setting(name, |s| s.internal = internal)
    }

    /// Hides a setting from listings and saves.
    pub fn set_hidden_from_editor(&self, name: &str, hidden: bool) -> Result<(), SettingsError> {
        self.update_setting(name, |s| s.hidden_from_editor = hidden)
    }

    /// Controls whether documentation shows the default value.
    pub fn set_ignore_value_in_docs(&self, name: &str, ignore: bool) -> Result<(), SettingsError> {
        self.update_setting(name, |s| s.ignore_value_in_docs = ignore)
    }

    /// Returns whether documentation hides the default value.
    pub fn get_ignore_value_in_docs(&self, name: &str) -> Result<bool, SettingsError> {
        self.read_setting(name, |s| s.ignore_value_in_docs)
    }

    /// Listing order of a setting.
    pub fn get_order(&self, name: &str) -> Result<u64, SettingsError> {
        self.read_setting(name, |s| s.order)
    }

    /// Overrides the listing order of a setting.
    pub fn set_order(&self, name: &str, order: u64) -> Result<(), SettingsError> {
        self.update_setting(name, |s| s.order = order)
    }

    /// Returns `true` if the setting differs from its initial value.
    pub fn can_revert(&self, name: &str) -> bool {
        self.lock()
            .props
            .get(name)
            .is_some_and(|s| s.initial.is_some() && s.is_changed())
    }

    /// The initial value of a setting, if one was declared.
    pub fn revert_value(&self, name: &str) -> Option<Value> {
        self.lock().props.get(name).and_then(|s| s.initial.clone())
    }

    /// Names of settings whose value differs from their initial value, in
    /// listing order.
    pub fn changed_settings(&self) -> Vec<String> {
        self.lock()
            .sorted()
            .into_iter()
            .filter(|(_, s)| s.is_changed())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Settings written when saving: not hidden and changed from default.
    pub(crate) fn persisted_entries(&self) -> Vec<(String, Value)> {
        self.lock()
            .sorted()
            .into_iter()
            .filter(|(_, s)| !s.hidden_from_editor && s.is_changed())
            .map(|(name, s)| (name.clone(), s.value.clone()))
            .collect()
    }

    /// Registers a prefix whose settings are listed as internal.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::DuplicatePrefix`] if it is already registered.
    pub fn add_hidden_prefix(&self, prefix: &str) -> Result<(), SettingsError> {
        let mut state = self.lock();
        if state.hidden_prefixes.iter().any(|p| p == prefix) {
            log::error!("Hidden prefix '{prefix}' already exists.");
            return Err(SettingsError::DuplicatePrefix(prefix.to_string()));
        }
        state.hidden_prefixes.push(prefix.to_string());
        Ok(())
    }

    /// Registered hidden prefixes in registration order.
    pub fn hidden_prefixes(&self) -> Vec<String> {
        self.lock().hidden_prefixes.clone()
    }

    /// Registers type and hint information for a setting. Registering a base
    /// name also covers its feature-tagged variants.
    pub fn set_custom_property_info(&self, info: PropertyInfo) {
        self.lock().custom_prop_info.insert(info.name.clone(), info);
    }

    /// Lists all settings not hidden from the editor, sorted by order then name.
    pub fn list(&self) -> Vec<PropertyInfo> {
        let state = self.lock();
        state
            .sorted()
            .into_iter()
            .filter(|(_, s)| !s.hidden_from_editor)
            .map(|(name, setting)| {
                let hidden_by_prefix = state
                    .hidden_prefixes
                    .iter()
                    .any(|p| name.starts_with(p.as_str()));

                let mut usage = PropertyUsage::STORAGE;
                if !setting.internal && !hidden_by_prefix {
                    usage |= PropertyUsage::EDITOR;
                }
                if setting.internal {
                    usage |= PropertyUsage::INTERNAL;
                }
                if setting.basic {
                    usage |= PropertyUsage::BASIC;
                }
                if setting.restart_if_changed {
                    usage |= PropertyUsage::RESTART_IF_CHANGED;
                }

                let custom = state.custom_prop_info.get(name.as_str()).or_else(|| {
                    let dot = name.find('.')?;
                    state.custom_prop_info.get(&name[..dot])
                });
                match custom {
                    Some(info) => PropertyInfo {
                        name: name.clone(),
                        usage,
                        ..info.clone()
                    },
                    None => PropertyInfo {
                        usage,
                        ..PropertyInfo::new(name.clone(), setting.value.value_type())
                    },
                }
            })
            .collect()
    }

    // --- Autoloads and global groups ---

    /// All autoloads, keyed by node name.
    pub fn autoloads(&self) -> BTreeMap<String, AutoloadInfo> {
        self.lock().tables.autoloads.clone()
    }

    /// One autoload by node name.
    pub fn autoload(&self, name: &str) -> Option<AutoloadInfo> {
        self.lock().tables.autoloads.get(name).cloned()
    }

    /// All global groups with their payloads.
    pub fn global_groups(&self) -> BTreeMap<String, Value> {
        self.lock().tables.global_groups.clone()
    }

    /// Recomputes the autoload and global group tables from the settings.
    pub fn rebuild_side_tables(&self) {
        let mut state = self.lock();
        state.tables = state.derive_tables();
    }

    /// Returns `true` if the incrementally maintained tables match a rebuild.
    pub fn verify_side_tables(&self) -> bool {
        let state = self.lock();
        state.derive_tables() == state.tables
    }

    // --- Change notification ---

    /// Subscribes to settings events.
    pub fn subscribe(&self) -> Receiver<SettingsEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: SettingsEvent) {
        self.events.emit(event);
    }

    fn queue_changed(&self) {
        self.changed.store(true, Ordering::Release);
    }

    /// Returns `true` if settings changed since the last flush.
    pub fn has_pending_changes(&self) -> bool {
        self.changed.load(Ordering::Acquire)
    }

    /// Emits a single [`SettingsEvent::Changed`] if anything changed since the
    /// last call. Meant to be called once per frame by the host loop.
    pub fn flush_changes(&self) -> bool {
        if self.changed.swap(false, Ordering::AcqRel) {
            self.events.emit(SettingsEvent::Changed);
            true
        } else {
            false
        }
    }

    // --- Paths ---

    /// The OS directory `res://` maps to, or empty before setup.
    pub fn resource_path(&self) -> String {
        self.fs.disk().root()
    }

    /// Sets the resource path. Backslashes are unified and one trailing `/` is dropped.
    pub fn set_resource_path(&self, path: &str) {
        let mut path = path.replace('\\', "/");
        if path.len() > 1 && path.ends_with('/') {
            path.pop();
        }
        self.fs.disk().set_root(path);
    }

    /// A resolver for the current resource path and user data directory.
    pub fn path_resolver(&self) -> PathResolver {
        PathResolver::new(self.resource_path(), self.platform.user_data_dir())
    }

    /// Converts an OS path inside the project into `res://` form.
    pub fn localize_path(&self, path: &str) -> String {
        self.path_resolver().localize(path)
    }

    /// Converts a `res://` or `user://` path into an OS path.
    pub fn globalize_path(&self, path: &str) -> String {
        self.path_resolver().globalize(path)
    }

    /// Name of the per-project data directory (`.nebula`, or `nebula` when not hidden).
    pub fn project_data_dir_name(&self) -> String {
        self.project_data_dir_name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_project_data_dir_name(&self, name: String) {
        *self
            .project_data_dir_name
            .write()
            .unwrap_or_else(PoisonError::into_inner) = name;
    }

    /// `res://` path of the per-project data directory.
    pub fn project_data_path(&self) -> String {
        format!("{RES_SCHEME}{}", self.project_data_dir_name())
    }

    /// `res://` path where imported files are cached.
    pub fn imported_files_path(&self) -> String {
        format!("{}/imported", self.project_data_path())
    }

    /// Returns `true` once setup has loaded a project.
    pub fn is_project_loaded(&self) -> bool {
        self.project_loaded.load(Ordering::Acquire)
    }

    pub(crate) fn set_project_loaded(&self, loaded: bool) {
        self.project_loaded.store(loaded, Ordering::Release);
    }
}

fn nonexistent(name: &str) -> SettingsError {
    log::error!("Request for nonexistent project setting: {name}.");
    SettingsError::NotFound(name.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::StaticPlatform;
    use crate::property::PropertyHint;
    use crate::value::ValueType;

    fn settings_with(features: &[&str]) -> ProjectSettings {
        ProjectSettings::new(Arc::new(StaticPlatform::with_features(features.iter().copied())))
    }

    #[test]
    fn test_set_and_get() {
        let settings = settings_with(&[]);
        settings.set("application/config/name", "Demo");
        assert_eq!(settings.get("application/config/name"), Value::from("Demo"));
        assert!(settings.has_setting("application/config/name"));
    }

    #[test]
    fn test_missing_get_returns_nil() {
        let settings = settings_with(&[]);
        assert_eq!(settings.get("nope"), Value::Nil);
        assert_eq!(settings.get_with_override("nope"), Value::Nil);
        assert_eq!(settings.get_or("nope", 3), Value::Int(3));
    }

    #[test]
    fn test_nil_deletes() {
        let settings = settings_with(&[]);
        settings.set("a", 1);
        settings.set("a", Value::Nil);
        assert!(!settings.has_setting("a"));
    }

    #[test]
    fn test_override_plain_name_matches_get() {
        let settings = settings_with(&["windows"]);
        settings.set("display/width", 1280);
        assert_eq!(
            settings.get_with_override("display/width"),
            settings.get("display/width")
        );
    }

    #[test]
    fn test_override_picks_active_feature() {
        let settings = settings_with(&["windows"]);
        settings.set("a", "base");
        settings.set("a.windows", "win");
        settings.set("a.linux", "lin");
        assert_eq!(settings.get_with_override("a"), Value::from("win"));
        assert_eq!(settings.get("a"), Value::from("base"));
    }

    #[test]
    fn test_override_first_declared_active_tag_wins() {
        let settings = settings_with(&["mobile", "android"]);
        settings.set("rendering/method", "forward");
        settings.set("rendering/method.mobile", "mobile");
        settings.set("rendering/method.android", "gl");
        assert_eq!(settings.get_with_override("rendering/method"), Value::from("mobile"));
    }

    #[test]
    fn test_override_without_base_setting() {
        let settings = settings_with(&["debug"]);
        settings.set("x.debug", true);
        assert_eq!(settings.get_with_override("x"), Value::Bool(true));
    }

    #[test]
    fn test_multi_tag_override_matches_any_tag() {
        let settings = settings_with(&["editor"]);
        settings.set("b", 1);
        settings.set("b.windows.editor", 2);
        assert_eq!(settings.get_with_override("b"), Value::Int(2));
    }

    #[test]
    fn test_custom_features_activate_overrides() {
        let settings = settings_with(&[]);
        settings.set("audio/bus", "main");
        settings.set("audio/bus.demo_build", "demo");
        assert_eq!(settings.get_with_override("audio/bus"), Value::from("main"));

        settings.set(CUSTOM_FEATURES_KEY, "demo_build, steam");
        assert!(!settings.has_setting(CUSTOM_FEATURES_KEY));
        assert_eq!(settings.custom_features(), ["demo_build", "steam"]);
        assert!(settings.has_feature("steam"));
        assert_eq!(settings.get_with_override("audio/bus"), Value::from("demo"));
    }

    #[test]
    fn test_deleted_override_falls_back_and_reregisters() {
        let settings = settings_with(&["windows"]);
        settings.set("a", 0);
        settings.set("a.windows", 1);
        settings.clear("a.windows");
        assert_eq!(settings.get_with_override("a"), Value::Int(0));

        settings.set("a.windows", 2);
        assert_eq!(settings.get_with_override("a"), Value::Int(2));
    }

    #[test]
    fn test_orders_are_never_reused() {
        let settings = settings_with(&[]);
        settings.set("autoload/Foo", "res://foo.gd");
        settings.set("other", 1);
        let first = settings.get_order("autoload/Foo").unwrap();
        let other = settings.get_order("other").unwrap();

        settings.clear("autoload/Foo");
        assert!(settings.autoload("Foo").is_none());

        settings.set("autoload/Foo", "res://foo.gd");
        let again = settings.get_order("autoload/Foo").unwrap();
        assert!(again > first);
        assert!(again > other);
    }

    #[test]
    fn test_update_keeps_order() {
        let settings = settings_with(&[]);
        settings.set("a", 1);
        let order = settings.get_order("a").unwrap();
        settings.set("a", 2);
        assert_eq!(settings.get_order("a").unwrap(), order);
    }

    #[test]
    fn test_autoload_side_table() {
        let settings = settings_with(&[]);
        let events = settings.subscribe();
        settings.set("autoload/Globals", "*res://globals/../globals.gd");
        settings.set("autoload/Music", "res://music.gd");

        let globals = settings.autoload("Globals").unwrap();
        assert!(globals.is_singleton);
        assert_eq!(globals.path, "res://globals.gd");
        assert!(!settings.autoload("Music").unwrap().is_singleton);

        settings.clear("autoload/Music");
        assert!(settings.autoload("Music").is_none());
        assert_eq!(
            events.try_recv(),
            Ok(SettingsEvent::AutoloadRemoved("Music".to_string()))
        );
        assert!(settings.verify_side_tables());
    }

    #[test]
    fn test_global_group_side_table() {
        let settings = settings_with(&[]);
        settings.set("global_group/enemies", "Hostile units");
        assert_eq!(
            settings.global_groups().get("enemies"),
            Some(&Value::from("Hostile units"))
        );
        settings.clear("global_group/enemies");
        assert!(settings.global_groups().is_empty());
    }

    #[test]
    fn test_rebuild_side_tables_matches_incremental() {
        let settings = settings_with(&[]);
        settings.set("autoload/A", "res://a.gd");
        settings.set("autoload/B", "*res://b.gd");
        settings.set("global_group/g", 1);
        let before = settings.autoloads();
        settings.rebuild_side_tables();
        assert_eq!(settings.autoloads(), before);
        assert!(settings.verify_side_tables());
    }

    #[test]
    fn test_metadata_on_missing_setting_fails() {
        let settings = settings_with(&[]);
        assert!(matches!(
            settings.set_as_basic("missing", true),
            Err(SettingsError::NotFound(_))
        ));
        assert!(settings.set_initial_value("missing", 1).is_err());
        assert!(settings.set_restart_if_changed("missing", true).is_err());
        assert!(settings.set_as_internal("missing", true).is_err());
        assert!(settings.set_ignore_value_in_docs("missing", true).is_err());
        assert!(settings.get_ignore_value_in_docs("missing").is_err());
        assert!(!settings.has_setting("missing"));
    }

    #[test]
    fn test_hidden_prefix_rejects_duplicate() {
        let settings = settings_with(&[]);
        settings.add_hidden_prefix("internal/").unwrap();
        assert!(matches!(
            settings.add_hidden_prefix("internal/"),
            Err(SettingsError::DuplicatePrefix(_))
        ));
        assert_eq!(settings.hidden_prefixes(), ["internal/"]);
    }

    #[test]
    fn test_list_usage_flags() {
        let settings = settings_with(&[]);
        settings.set("visible", 1);
        settings.set("flagged", 2);
        settings.set("internal/by_prefix", 3);
        settings.set("hidden", 4);
        settings.set_as_internal("flagged", true).unwrap();
        settings.set_as_basic("visible", true).unwrap();
        settings.set_restart_if_changed("visible", true).unwrap();
        settings.set_hidden_from_editor("hidden", true).unwrap();
        settings.add_hidden_prefix("internal/").unwrap();

        let list = settings.list();
        let names: Vec<_> = list.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["visible", "flagged", "internal/by_prefix"]);

        assert_eq!(
            list[0].usage,
            PropertyUsage::STORAGE
                | PropertyUsage::EDITOR
                | PropertyUsage::BASIC
                | PropertyUsage::RESTART_IF_CHANGED
        );
        assert_eq!(list[1].usage, PropertyUsage::STORAGE | PropertyUsage::INTERNAL);
        assert_eq!(list[2].usage, PropertyUsage::STORAGE);
    }

    #[test]
    fn test_list_ties_sorted_by_name() {
        let settings = settings_with(&[]);
        settings.set("b", 1);
        settings.set("a", 1);
        settings.set_order("b", 7).unwrap();
        settings.set_order("a", 7).unwrap();
        let names: Vec<_> = settings.list().into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn test_custom_property_info_covers_variants() {
        let settings = settings_with(&[]);
        settings.set("physics/fps", 60);
        settings.set("physics/fps.mobile", 30);
        settings.set_custom_property_info(
            PropertyInfo::new("physics/fps", ValueType::Int).with_hint(PropertyHint::Range, "1,240"),
        );

        let list = settings.list();
        assert_eq!(list[1].name, "physics/fps.mobile");
        assert_eq!(list[1].hint, PropertyHint::Range);
        assert_eq!(list[1].hint_string, "1,240");
        assert!(list[1].usage.contains(PropertyUsage::EDITOR));
    }

    #[test]
    fn test_define_records_initial_and_builtin_order() {
        let settings = settings_with(&[]);
        settings.set("user/setting", 1);
        assert_eq!(settings.define("display/width", 1280), Value::Int(1280));
        assert!(!settings.can_revert("display/width"));
        assert!(settings.get_order("display/width").unwrap() < settings.get_order("user/setting").unwrap());

        settings.set("display/width", 1920);
        assert!(settings.can_revert("display/width"));
        assert_eq!(settings.revert_value("display/width"), Some(Value::Int(1280)));
        assert_eq!(settings.changed_settings(), ["display/width", "user/setting"]);

        // An existing value wins over the declared default.
        assert_eq!(settings.define("display/width", 1280), Value::Int(1920));
    }

    #[test]
    fn test_initial_value_is_independent_copy() {
        let settings = settings_with(&[]);
        let list = Value::Array(vec![Value::Int(1)]);
        settings.set("list", list.clone());
        settings.set_initial_value("list", list).unwrap();
        settings.set("list", Value::Array(vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(settings.revert_value("list"), Some(Value::Array(vec![Value::Int(1)])));
    }

    #[test]
    fn test_changes_are_coalesced() {
        let settings = settings_with(&[]);
        let events = settings.subscribe();
        settings.set("a", 1);
        settings.set("b", 2);
        settings.set("a", 3);

        assert!(settings.flush_changes());
        assert!(!settings.flush_changes());
        assert_eq!(events.try_iter().collect::<Vec<_>>(), [SettingsEvent::Changed]);
    }

    #[test]
    fn test_ignore_value_in_docs_roundtrip() {
        let settings = settings_with(&[]);
        settings.set("a", 1);
        assert!(!settings.get_ignore_value_in_docs("a").unwrap());
        settings.set_ignore_value_in_docs("a", true).unwrap();
        assert!(settings.get_ignore_value_in_docs("a").unwrap());
    }

    #[test]
    fn test_concurrent_writers() {
        let settings = Arc::new(settings_with(&[]));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let settings = Arc::clone(&settings);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        settings.set(&format!("thread{t}/value{i}"), i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let list = settings.list();
        assert_eq!(list.len(), 200);
        let mut orders: Vec<_> = list
            .iter()
            .map(|p| settings.get_order(&p.name).unwrap())
            .collect();
        orders.dedup();
        assert_eq!(orders.len(), 200);
    }

    #[test]
    fn test_project_data_paths() {
        let settings = settings_with(&[]);
        assert_eq!(settings.project_data_path(), "res://.nebula");
        assert_eq!(settings.imported_files_path(), "res://.nebula/imported");
    }

    #[test]
    fn test_resource_path_trailing_slash_dropped() {
        let settings = settings_with(&[]);
        settings.set_resource_path("C:\\games\\demo\\");
        assert_eq!(settings.resource_path(), "C:/games/demo");
        assert_eq!(settings.globalize_path("res://a.png"), "C:/games/demo/a.png");
    }
}
