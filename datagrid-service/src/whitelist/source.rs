//! Whitelist resolution and caching

use std::sync::Arc;

use dashmap::DashMap;
use figment::Figment;

use super::{ColumnWhitelist, EndpointId};
use crate::error::{Error, Result};

/// Resolves the whitelist registered for an endpoint
///
/// Implementations fail with [`Error::ConfigurationMissing`] when nothing is
/// registered, and with [`Error::InvalidWhitelist`] when what is registered
/// does not validate.
pub trait WhitelistSource: Send + Sync {
    /// Resolve the whitelist for `endpoint`
    fn resolve(&self, endpoint: &EndpointId) -> Result<Arc<ColumnWhitelist>>;
}

impl<S: WhitelistSource + ?Sized> WhitelistSource for Arc<S> {
    fn resolve(&self, endpoint: &EndpointId) -> Result<Arc<ColumnWhitelist>> {
        (**self).resolve(endpoint)
    }
}

/// Reads whitelists from the `datatables` section of a figment
///
/// Every call extracts and validates the section again; wrap it in a
/// [`CachedWhitelistSource`] for request paths.
#[derive(Debug, Clone)]
pub struct FigmentWhitelistSource {
    figment: Figment,
}

impl FigmentWhitelistSource {
    /// Wrap an already merged figment
    pub fn new(figment: Figment) -> Self {
        Self { figment }
    }

    /// Every endpoint registered under `datatables`, in key order
    pub fn endpoints(&self) -> Result<Vec<EndpointId>> {
        let Ok(section) = self.figment.find_value("datatables") else {
            return Ok(Vec::new());
        };
        let resources = section.into_dict().ok_or_else(|| {
            Error::InvalidWhitelist("'datatables' must be a table of resources".to_string())
        })?;

        let mut endpoints = Vec::new();
        for (resource, operations) in resources {
            let operations = operations.into_dict().ok_or_else(|| {
                Error::InvalidWhitelist(format!(
                    "'datatables.{}' must be a table of operations",
                    resource
                ))
            })?;
            for operation in operations.keys() {
                endpoints.push(EndpointId::new(&resource, operation)?);
            }
        }
        Ok(endpoints)
    }
}

impl WhitelistSource for FigmentWhitelistSource {
    fn resolve(&self, endpoint: &EndpointId) -> Result<Arc<ColumnWhitelist>> {
        let key = endpoint.config_key();
        if !self.figment.contains(&key) {
            return Err(Error::ConfigurationMissing { endpoint: key });
        }

        let whitelist: ColumnWhitelist = self.figment.extract_inner(&key)?;
        whitelist.validate()?;
        tracing::debug!(
            endpoint = %endpoint,
            table = whitelist.table_name(),
            columns = whitelist.columns().len(),
            "Loaded DataTables whitelist"
        );
        Ok(Arc::new(whitelist))
    }
}

/// Memoizes successful resolutions of an inner source
///
/// Failures are not cached, so a fixed configuration is picked up on the
/// next request once the inner source starts resolving.
pub struct CachedWhitelistSource<S> {
    inner: S,
    cache: DashMap<EndpointId, Arc<ColumnWhitelist>>,
}

impl<S: WhitelistSource> CachedWhitelistSource<S> {
    /// Cache in front of `inner`
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }

    /// Drop one cached entry
    pub fn invalidate(&self, endpoint: &EndpointId) {
        self.cache.remove(endpoint);
    }

    /// Drop every cached entry
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl<S: WhitelistSource> WhitelistSource for CachedWhitelistSource<S> {
    fn resolve(&self, endpoint: &EndpointId) -> Result<Arc<ColumnWhitelist>> {
        if let Some(cached) = self.cache.get(endpoint) {
            return Ok(Arc::clone(cached.value()));
        }

        let whitelist = self.inner.resolve(endpoint)?;
        self.cache
            .insert(endpoint.clone(), Arc::clone(&whitelist));
        Ok(whitelist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::providers::{Format, Toml};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CONFIG: &str = r#"
        [datatables.Customers.Index]
        table_name = "Customers"

        [[datatables.Customers.Index.columns]]
        name = "CustomerID"
        title = "ID"
        sortable = true

        [[datatables.Customers.Index.columns]]
        name = "CompanyName"
        title = "Company"
        searchable = true
        sortable = true
        globally_searchable = true

        [datatables.Products.Index]
        table_name = "Products"
        columns = [{ name = "ProductName", searchable = true }]

        [datatables.Broken.Index]
        table_name = "Orders; DROP TABLE Orders"
    "#;

    fn source() -> FigmentWhitelistSource {
        FigmentWhitelistSource::new(Figment::from(Toml::string(CONFIG)))
    }

    #[test]
    fn test_resolves_registered_endpoint() {
        let endpoint = EndpointId::new("CustomersController", "IndexData").unwrap();
        let whitelist = source().resolve(&endpoint).unwrap();
        assert_eq!(whitelist.table_name(), "Customers");
        assert_eq!(whitelist.columns().len(), 2);
        let company = whitelist.column("CompanyName").unwrap();
        assert_eq!(company.title, "Company");
        assert!(company.globally_searchable);
    }

    #[test]
    fn test_missing_endpoint_names_config_key() {
        let endpoint = EndpointId::new("Orders", "Index").unwrap();
        match source().resolve(&endpoint) {
            Err(Error::ConfigurationMissing { endpoint }) => {
                assert_eq!(endpoint, "datatables.Orders.Index")
            }
            other => panic!("expected ConfigurationMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_whitelist_is_rejected() {
        let endpoint = EndpointId::new("Broken", "Index").unwrap();
        assert!(matches!(
            source().resolve(&endpoint),
            Err(Error::InvalidWhitelist(_))
        ));
    }

    #[test]
    fn test_lists_endpoints() {
        let endpoints = source().endpoints().unwrap();
        let names: Vec<String> = endpoints.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["Broken.Index", "Customers.Index", "Products.Index"]);
    }

    #[test]
    fn test_no_datatables_section() {
        let source = FigmentWhitelistSource::new(Figment::new());
        assert!(source.endpoints().unwrap().is_empty());
    }

    struct CountingSource {
        calls: AtomicUsize,
        inner: FigmentWhitelistSource,
    }

    impl WhitelistSource for CountingSource {
        fn resolve(&self, endpoint: &EndpointId) -> Result<Arc<ColumnWhitelist>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.resolve(endpoint)
        }
    }

    #[test]
    fn test_cache_hits_skip_inner_source() {
        let cached = CachedWhitelistSource::new(CountingSource {
            calls: AtomicUsize::new(0),
            inner: source(),
        });
        let endpoint = EndpointId::new("Products", "Index").unwrap();

        let first = cached.resolve(&endpoint).unwrap();
        let second = cached.resolve(&endpoint).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.len(), 1);

        cached.invalidate(&endpoint);
        assert!(cached.is_empty());
        cached.resolve(&endpoint).unwrap();
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cache_does_not_remember_misses() {
        let cached = CachedWhitelistSource::new(CountingSource {
            calls: AtomicUsize::new(0),
            inner: source(),
        });
        let endpoint = EndpointId::new("Orders", "Index").unwrap();

        assert!(cached.resolve(&endpoint).is_err());
        assert!(cached.resolve(&endpoint).is_err());
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
        assert!(cached.is_empty());
    }
}
