//! Deterministic dataset identifiers
//!
//! Identifiers are name-based (version 5) UUIDs nested under an
//! organisational namespace, which is itself derived from the DNS
//! namespace. Minting the same name under the same scheme always
//! yields the same identifier.

use uuid::Uuid;

use crate::error::CatalogError;

/// Placeholder substituted with the dataset name in a format template
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Naming scheme for minted identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdScheme {
    /// Organisational root, hashed under the DNS namespace (e.g. "datalad.org")
    pub namespace_root: String,
    /// Template for the hashed name, containing `{name}`
    pub format: String,
}

impl Default for IdScheme {
    fn default() -> Self {
        Self {
            namespace_root: "datalad.org".to_string(),
            format: "abcd-j.{name}".to_string(),
        }
    }
}

impl IdScheme {
    /// Create a scheme, checking that the template uses the name
    pub fn new(
        namespace_root: impl Into<String>,
        format: impl Into<String>,
    ) -> Result<Self, CatalogError> {
        let scheme = Self {
            namespace_root: namespace_root.into(),
            format: format.into(),
        };
        validate_format(&scheme.format)?;
        Ok(scheme)
    }

    /// The namespace UUID all identifiers of this scheme live under
    pub fn namespace(&self) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_DNS, self.namespace_root.as_bytes())
    }

    /// Render the raw string that gets hashed for a dataset name
    pub fn raw_id(&self, name: &str) -> String {
        self.format.replace(NAME_PLACEHOLDER, name)
    }
}

/// Mint a dataset identifier from its name
///
/// # Arguments
/// * `name` - The dataset's declared name
/// * `scheme` - Namespace root and format template
///
/// # Returns
/// The identifier, or an error if the scheme's template never uses the name
pub fn mint(name: &str, scheme: &IdScheme) -> Result<Uuid, CatalogError> {
    validate_format(&scheme.format)?;
    Ok(Uuid::new_v5(&scheme.namespace(), scheme.raw_id(name).as_bytes()))
}

/// Validate a format template
fn validate_format(format: &str) -> Result<(), CatalogError> {
    if !format.contains(NAME_PLACEHOLDER) {
        return Err(CatalogError::MalformedInput(format!(
            "Identifier format '{}' must contain {}",
            format, NAME_PLACEHOLDER
        )));
    }
    Ok(())
}
