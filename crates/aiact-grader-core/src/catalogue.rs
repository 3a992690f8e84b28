use once_cell::sync::Lazy;
use serde::Serialize;

/// Stable identifier of the obligation whose critical gap triggers its own ceiling.
pub const HUMAN_OVERSIGHT_ID: &str = "human_oversight";

/// One of the mandatory EU AI Act duties a diagnostic is assessed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Obligation {
    /// Stable snake_case identifier; never localised or renamed.
    pub id: &'static str,
    pub name: &'static str,
    pub article: &'static str,
    pub description: &'static str,
}

static CATALOGUE: Lazy<Vec<Obligation>> = Lazy::new(|| {
    vec![
        Obligation {
            id: "risk_management",
            name: "Risk Management System",
            article: "Article 9",
            description: "Establish, document and maintain a continuous, iterative risk management process across the system lifecycle.",
        },
        Obligation {
            id: "data_governance",
            name: "Data and Data Governance",
            article: "Article 10",
            description: "Training, validation and testing data sets meet quality criteria and are subject to data governance practices.",
        },
        Obligation {
            id: "technical_documentation",
            name: "Technical Documentation",
            article: "Article 11",
            description: "Technical documentation demonstrating conformity is drawn up before market placement and kept up to date.",
        },
        Obligation {
            id: "record_keeping",
            name: "Record-Keeping",
            article: "Article 12",
            description: "The system technically allows automatic recording of events (logs) over its lifetime.",
        },
        Obligation {
            id: "transparency",
            name: "Transparency and Provision of Information to Deployers",
            article: "Article 13",
            description: "Operation is sufficiently transparent and accompanied by instructions for use that deployers can interpret.",
        },
        Obligation {
            id: HUMAN_OVERSIGHT_ID,
            name: "Human Oversight",
            article: "Article 14",
            description: "The system is designed so natural persons can effectively oversee it while it is in use.",
        },
        Obligation {
            id: "accuracy_robustness_cybersecurity",
            name: "Accuracy, Robustness and Cybersecurity",
            article: "Article 15",
            description: "The system achieves an appropriate level of accuracy, robustness and cybersecurity, performing consistently.",
        },
        Obligation {
            id: "quality_management",
            name: "Quality Management System",
            article: "Article 17",
            description: "A documented quality management system ensures compliance with the regulation.",
        },
    ]
});

/// Full catalogue in article order.
pub fn obligations() -> &'static [Obligation] {
    &CATALOGUE
}

/// Look up an obligation by its stable identifier.
pub fn obligation(id: &str) -> Option<&'static Obligation> {
    CATALOGUE.iter().find(|obligation| obligation.id == id)
}
