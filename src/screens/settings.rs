use super::drain;
use crate::preferences::{Settings, ThemeMode};
use crate::store::{Change, Store};
use anyhow::Result;
use std::sync::mpsc::Receiver;

pub struct SettingsViewModel {
    pub settings: Settings,
    changes: Receiver<Change>,
}

impl SettingsViewModel {
    pub fn new(store: &Store) -> Self {
        SettingsViewModel {
            settings: store.settings(),
            changes: store.subscribe(),
        }
    }

    pub fn poll(&mut self, store: &Store) -> bool {
        if drain(&self.changes, &[Change::Preferences]) {
            self.settings = store.settings();
            return true;
        }
        false
    }

    pub fn toggle_dynamic_color(&self, store: &Store) -> Result<Settings> {
        store.set_dynamic_color(!self.settings.dynamic_color)
    }

    /// System -> Light -> Dark -> System
    pub fn cycle_theme_mode(&self, store: &Store) -> Result<Settings> {
        store.set_theme_mode(self.settings.theme_mode.next())
    }

    pub fn set_theme_mode(&self, store: &Store, mode: ThemeMode) -> Result<Settings> {
        store.set_theme_mode(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let store = Store::in_memory().unwrap();
        let vm = SettingsViewModel::new(&store);
        assert!(vm.settings.dynamic_color);
        assert_eq!(vm.settings.theme_mode, ThemeMode::System);
    }

    #[test]
    fn test_toggle_and_cycle_through_store() {
        let store = Store::in_memory().unwrap();
        let mut vm = SettingsViewModel::new(&store);

        vm.toggle_dynamic_color(&store).unwrap();
        // Not applied until the change comes back around
        assert!(vm.settings.dynamic_color);
        assert!(vm.poll(&store));
        assert!(!vm.settings.dynamic_color);

        vm.cycle_theme_mode(&store).unwrap();
        vm.poll(&store);
        assert_eq!(vm.settings.theme_mode, ThemeMode::Light);
        vm.cycle_theme_mode(&store).unwrap();
        vm.poll(&store);
        assert_eq!(vm.settings.theme_mode, ThemeMode::Dark);

        vm.set_theme_mode(&store, ThemeMode::System).unwrap();
        vm.poll(&store);
        assert_eq!(vm.settings.theme_mode, ThemeMode::System);
        assert!(!vm.settings.dynamic_color);
    }

    #[test]
    fn test_two_screens_stay_in_sync() {
        let store = Store::in_memory().unwrap();
        let first = SettingsViewModel::new(&store);
        let mut second = SettingsViewModel::new(&store);

        first.set_theme_mode(&store, ThemeMode::Dark).unwrap();
        assert!(second.poll(&store));
        assert_eq!(second.settings.theme_mode, ThemeMode::Dark);
    }
}
