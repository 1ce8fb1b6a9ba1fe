use dot11::MacAddress;
use mac_oui::Oui;
use tracing::warn;

/// Manufacturer lookup over the bundled IEEE OUI table.
pub struct OuiDatabase {
    db: Option<Oui>,
}

impl OuiDatabase {
    /// Loads the bundled table. A table that fails to load behaves like [`OuiDatabase::disabled`].
    pub fn load() -> Self {
        match Oui::default() {
            Ok(db) => OuiDatabase { db: Some(db) },
            Err(e) => {
                warn!("Vendor lookups disabled, OUI table failed to load: {}", e);
                OuiDatabase::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        OuiDatabase { db: None }
    }

    pub fn search(&self, mac: &MacAddress) -> Option<String> {
        let db = self.db.as_ref()?;
        match db.lookup_by_mac(&mac.to_string()) {
            Ok(entry) => entry.map(|entry| entry.company_name.clone()),
            Err(_) => None,
        }
    }
}

impl Default for OuiDatabase {
    fn default() -> Self {
        OuiDatabase::load()
    }
}
