use serde::{Deserialize, Serialize};

/// Fixed menu entries answered without consulting the agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuOption {
    BusinessHours,
    Contact,
    Support,
    Pricing,
    Location,
}

impl MenuOption {
    pub const ALL: [MenuOption; 5] =
        [Self::BusinessHours, Self::Contact, Self::Support, Self::Pricing, Self::Location];
}

/// Canned replies for each [`MenuOption`]. Overridable from the `[menu]` config section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuTemplates {
    pub business_hours: String,
    pub contact: String,
    pub support: String,
    pub pricing: String,
    pub location: String,
}

impl Default for MenuTemplates {
    fn default() -> Self {
        Self {
            business_hours: "Our office hours are Monday to Friday from 8:00 AM to 5:00 PM and \
                             Saturday from 9:00 AM to 1:00 PM."
                .to_string(),
            contact: "You can reach us at 018000-123456 or send an email to info@example.com."
                .to_string(),
            support: "For technical support, please describe your problem and an AI or human \
                      agent will assist you. You can also visit the FAQ section on our website."
                .to_string(),
            pricing: "Our plans start at $29 per month. Ask me about any product for a detailed \
                      price breakdown."
                .to_string(),
            location: "We are located at Calle 10 #43-12, Medellín, Colombia. Visitors are \
                       welcome during office hours."
                .to_string(),
        }
    }
}

impl MenuTemplates {
    pub fn reply_for(&self, option: MenuOption) -> &str {
        match option {
            MenuOption::BusinessHours => &self.business_hours,
            MenuOption::Contact => &self.contact,
            MenuOption::Support => &self.support,
            MenuOption::Pricing => &self.pricing,
            MenuOption::Location => &self.location,
        }
    }
}
