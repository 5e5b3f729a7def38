//! Intent dispatch table.
//!
//! Dialogflow classifies each turn with an intent display name. The table
//! below is the single place that maps those labels onto handling paths; any
//! label not listed (including a missing one) falls through to the answering
//! agent.

use crate::menu::MenuOption;

pub const SALE_PRODUCT_SLOT: &str = "producto";
pub const SALE_CLIENT_SLOT: &str = "cliente";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntentKind {
    Menu(MenuOption),
    ConfirmSale,
    Fallback,
}

const DISPATCH_TABLE: &[(&str, IntentKind)] = &[
    ("MenuOpcion_Horarios", IntentKind::Menu(MenuOption::BusinessHours)),
    ("MenuOpcion_Contacto", IntentKind::Menu(MenuOption::Contact)),
    ("MenuOpcion_Soporte", IntentKind::Menu(MenuOption::Support)),
    ("MenuOpcion_Precios", IntentKind::Menu(MenuOption::Pricing)),
    ("MenuOpcion_Ubicacion", IntentKind::Menu(MenuOption::Location)),
    ("Confirmar_Venta_Intent", IntentKind::ConfirmSale),
];

impl IntentKind {
    pub fn from_label(label: Option<&str>) -> Self {
        let Some(label) = label.map(str::trim) else {
            return Self::Fallback;
        };

        DISPATCH_TABLE
            .iter()
            .find(|(known, _)| *known == label)
            .map(|(_, kind)| *kind)
            .unwrap_or(Self::Fallback)
    }

    pub fn label(&self) -> Option<&'static str> {
        DISPATCH_TABLE.iter().find(|(_, kind)| kind == self).map(|(label, _)| *label)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Menu(_) => "menu",
            Self::ConfirmSale => "confirm_sale",
            Self::Fallback => "fallback",
        }
    }
}

pub fn known_labels() -> impl Iterator<Item = &'static str> {
    DISPATCH_TABLE.iter().map(|(label, _)| *label)
}
