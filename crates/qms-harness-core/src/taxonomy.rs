//! Module taxonomy and audit-label normalization.
//!
//! Categories in the tabular source are free text ("02-Operations",
//! "Sales", "05 - HR & Training"). They are mapped onto a fixed set of
//! business modules by an ordered list of case-insensitive substring
//! matchers, first match wins. Display order is a property of the module,
//! not of the matcher list.

use serde::Serialize;

/// A taxonomy bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Module {
    pub id: &'static str,
    pub name: &'static str,
    #[serde(skip)]
    pub order: u8,
}

pub const SALES: Module = Module {
    id: "sales",
    name: "Sales & Customer Service",
    order: 1,
};
pub const OPERATIONS: Module = Module {
    id: "operations",
    name: "Operations & Production",
    order: 2,
};
pub const QUALITY: Module = Module {
    id: "quality",
    name: "Quality & Audit",
    order: 3,
};
pub const PROCUREMENT: Module = Module {
    id: "procurement",
    name: "Procurement & Vendors",
    order: 4,
};
pub const HR: Module = Module {
    id: "hr",
    name: "HR & Training",
    order: 5,
};
pub const RND: Module = Module {
    id: "rnd",
    name: "R&D & Design",
    order: 6,
};
pub const MANAGEMENT: Module = Module {
    id: "management",
    name: "Management & Documentation",
    order: 7,
};

/// All modules in display order.
pub const MODULES: [Module; 7] = [SALES, OPERATIONS, QUALITY, PROCUREMENT, HR, RND, MANAGEMENT];

/// Ordered (substring, module) matchers.
const CATEGORY_MATCHERS: &[(&str, Module)] = &[
    ("sales", SALES),
    ("01", SALES),
    ("operations", OPERATIONS),
    ("02", OPERATIONS),
    ("quality", QUALITY),
    ("03", QUALITY),
    ("procurement", PROCUREMENT),
    ("04", PROCUREMENT),
    ("hr", HR),
    ("05", HR),
    ("r&d", RND),
    ("rnd", RND),
    ("06", RND),
    ("management", MANAGEMENT),
    ("07", MANAGEMENT),
];

/// Map a free-text category onto a module. Unmapped categories yield `None`.
pub fn normalize_category(category: &str) -> Option<Module> {
    let lower = category.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }
    CATEGORY_MATCHERS
        .iter()
        .find(|(token, _)| lower.contains(token))
        .map(|(_, module)| *module)
}

/// Look up a module by id.
pub fn module_by_id(id: &str) -> Option<Module> {
    MODULES.iter().find(|m| m.id == id).copied()
}

/// Display name for a category, falling back to the raw text.
pub fn module_name_for(category: &str) -> String {
    normalize_category(category)
        .map(|m| m.name.to_string())
        .unwrap_or_else(|| category.to_string())
}

/// Coarse audit classification of a status label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditClass {
    Compliant,
    Pending,
    Issue,
}

/// Classify a record-level status label.
///
/// "approved"/"compliant"/✅ are compliant; "rejected", "nc", "issue",
/// "invalid" and ❌ flag nonconformity; everything else is pending.
pub fn normalize_audit_status(label: &str) -> AuditClass {
    let lower = label.trim().to_lowercase();
    if lower.contains("approved") || lower.contains("compliant") || lower.contains('✅') {
        return AuditClass::Compliant;
    }
    const ISSUE_TOKENS: [&str; 5] = ["rejected", "nc", "issue", "invalid", "❌"];
    if ISSUE_TOKENS.iter().any(|t| lower.contains(t)) {
        return AuditClass::Issue;
    }
    AuditClass::Pending
}
