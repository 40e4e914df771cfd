//! Hardware-address prefix to vendor name.

use std::sync::OnceLock;

use mac_oui::Oui;

pub trait VendorLookup: Send + Sync {
    fn vendor(&self, hardware_address: &str) -> Option<String>;
}

/// Lookup against the bundled IEEE OUI database, loaded on first use.
#[derive(Debug, Default, Clone, Copy)]
pub struct OuiVendorLookup;

static OUI_DB: OnceLock<Option<Oui>> = OnceLock::new();

fn oui_db() -> Option<&'static Oui> {
    OUI_DB
        .get_or_init(|| match Oui::default() {
            Ok(db) => Some(db),
            Err(_) => {
                tracing::warn!("OUI database failed to load, vendor lookup disabled");
                None
            }
        })
        .as_ref()
}

impl VendorLookup for OuiVendorLookup {
    fn vendor(&self, hardware_address: &str) -> Option<String> {
        match oui_db()?.lookup_by_mac(hardware_address) {
            Ok(Some(entry)) => Some(entry.company_name.clone()),
            _ => None,
        }
    }
}

/// Lookup that never knows a vendor.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoVendorLookup;

impl VendorLookup for NoVendorLookup {
    fn vendor(&self, _hardware_address: &str) -> Option<String> {
        None
    }
}
