//! The use-case registry: which query types each use case offers and which backends may serve
//! them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use tsbench_planner::HighLevelQuery;

use crate::cassandra::CassandraBackend;
use crate::usecase::{
    Backend, DevopsQueries, DevopsQuery, GeneratorConfig, IotQueries, IotQuery, QueryFiller,
    UseCase,
};
use crate::{Error, Result};

const HOUR: Duration = Duration::from_secs(3600);

/// Maps use cases to their query types and backends to the use cases they are registered for
///
/// A registry is built once at startup and then only read.
#[derive(Debug, Default)]
pub struct UseCaseRegistry {
    query_types: BTreeMap<UseCase, BTreeMap<String, QueryFiller>>,
    backends: BTreeMap<String, RegisteredBackend>,
}

#[derive(Debug)]
struct RegisteredBackend {
    backend: Arc<dyn Backend>,
    use_cases: Vec<UseCase>,
}

impl UseCaseRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in query type and the Cassandra backend for devops
    pub fn standard() -> Result<Self> {
        let mut registry = Self::new().with_builtin_query_types();
        registry.register_backend(Arc::new(CassandraBackend), &[UseCase::Devops])?;
        Ok(registry)
    }

    /// Register the devops and iot query types
    pub fn with_builtin_query_types(mut self) -> Self {
        for (metrics, hosts, hours) in [
            (1, 1, 1),
            (1, 1, 12),
            (1, 8, 1),
            (5, 1, 1),
            (5, 1, 12),
            (5, 8, 1),
        ] {
            self.register_query_type(
                format!("single-groupby-{metrics}-{hosts}-{hours}"),
                QueryFiller::Devops(DevopsQuery::SingleGroupby {
                    metrics,
                    hosts,
                    hours,
                }),
            );
        }
        for (name, hosts, window) in [
            ("cpu-max-all-1", 1, 8 * HOUR),
            ("cpu-max-all-8", 8, 8 * HOUR),
            ("cpu-max-all-32-24", 32, 24 * HOUR),
        ] {
            self.register_query_type(
                name,
                QueryFiller::Devops(DevopsQuery::MaxAll { hosts, window }),
            );
        }
        for (name, metrics) in [
            ("double-groupby-1", 1),
            ("double-groupby-5", 5),
            ("double-groupby-all", crate::CPU_METRICS.len()),
        ] {
            self.register_query_type(
                name,
                QueryFiller::Devops(DevopsQuery::DoubleGroupby { metrics }),
            );
        }
        self.register_query_type(
            "groupby-orderby-limit",
            QueryFiller::Devops(DevopsQuery::GroupbyOrderbyLimit),
        );
        self.register_query_type(
            "high-cpu-all",
            QueryFiller::Devops(DevopsQuery::HighCpu { hosts: 0 }),
        );
        self.register_query_type(
            "high-cpu-1",
            QueryFiller::Devops(DevopsQuery::HighCpu { hosts: 1 }),
        );
        self.register_query_type("lastpoint", QueryFiller::Devops(DevopsQuery::Lastpoint));

        self.register_query_type("last-loc", QueryFiller::Iot(IotQuery::LastLocation));
        self.register_query_type("avg-load", QueryFiller::Iot(IotQuery::AverageLoad));
        self
    }

    /// Register a query type under the use case its filler belongs to, replacing any previous
    /// filler of that name
    pub fn register_query_type(&mut self, name: impl Into<String>, filler: QueryFiller) {
        self.query_types
            .entry(filler.use_case())
            .or_default()
            .insert(name.into(), filler);
    }

    /// Register `backend` for `use_cases`
    ///
    /// Fails if the backend lacks the capability one of the use cases needs, or if a backend of
    /// the same name is already registered. Nothing is registered on failure.
    pub fn register_backend(
        &mut self,
        backend: Arc<dyn Backend>,
        use_cases: &[UseCase],
    ) -> Result<()> {
        let name = backend.name().to_string();
        if let Some(use_case) = use_cases.iter().find(|uc| !backend.supports(**uc)) {
            return Err(Error::UseCaseNotImplemented {
                use_case: *use_case,
                backend: name,
            });
        }
        if self.backends.contains_key(&name) {
            return Err(Error::DuplicateBackend(name));
        }

        info!(backend = %name, ?use_cases, "registered backend");
        self.backends.insert(
            name,
            RegisteredBackend {
                backend,
                use_cases: use_cases.to_vec(),
            },
        );
        Ok(())
    }

    /// Query type names of `use_case`, sorted
    pub fn query_types(&self, use_case: UseCase) -> impl Iterator<Item = &str> {
        self.query_types
            .get(&use_case)
            .into_iter()
            .flat_map(|types| types.keys().map(String::as_str))
    }

    /// Names of the registered backends, sorted
    pub fn backends(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }

    /// A generator of `query_type` queries of `use_case` for `backend`
    pub fn query_generator(
        &self,
        backend: &str,
        use_case: UseCase,
        query_type: &str,
        config: &GeneratorConfig,
    ) -> Result<QueryGenerator> {
        let registered = self
            .backends
            .get(backend)
            .ok_or_else(|| Error::UnknownBackend(backend.to_string()))?;
        if !registered.use_cases.contains(&use_case) {
            return Err(Error::UseCaseNotRegistered {
                use_case,
                backend: backend.to_string(),
            });
        }
        let filler = self
            .query_types
            .get(&use_case)
            .and_then(|types| types.get(query_type))
            .copied()
            .ok_or_else(|| Error::UnknownQueryType {
                use_case,
                query_type: query_type.to_string(),
            })?;

        let not_implemented = || Error::UseCaseNotImplemented {
            use_case,
            backend: backend.to_string(),
        };
        let queries = match filler {
            QueryFiller::Devops(query) => {
                let maker = registered.backend.as_devops().ok_or_else(not_implemented)?;
                Queries::Devops {
                    query,
                    queries: maker.new_devops(config)?,
                }
            }
            QueryFiller::Iot(query) => {
                let maker = registered.backend.as_iot().ok_or_else(not_implemented)?;
                Queries::Iot {
                    query,
                    queries: maker.new_iot(config)?,
                }
            }
        };

        debug!(backend, %use_case, query_type, "created query generator");
        Ok(QueryGenerator {
            query_type: query_type.to_string(),
            queries,
            next_id: 0,
        })
    }
}

/// Produces successive queries of one type for one backend
pub struct QueryGenerator {
    query_type: String,
    queries: Queries,
    next_id: u64,
}

enum Queries {
    Devops {
        query: DevopsQuery,
        queries: Box<dyn DevopsQueries>,
    },
    Iot {
        query: IotQuery,
        queries: Box<dyn IotQueries>,
    },
}

impl fmt::Debug for QueryGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryGenerator")
            .field("query_type", &self.query_type)
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl QueryGenerator {
    pub fn query_type(&self) -> &str {
        &self.query_type
    }

    /// The next query; ids count up from zero
    pub fn generate(&mut self) -> Result<HighLevelQuery> {
        let mut query = HighLevelQuery::new(
            "",
            "",
            DateTime::<Utc>::UNIX_EPOCH,
            DateTime::<Utc>::UNIX_EPOCH,
        );
        match &mut self.queries {
            Queries::Devops { query: q, queries } => q.fill(queries.as_mut(), &mut query)?,
            Queries::Iot { query: q, queries } => q.fill(queries.as_mut(), &mut query)?,
        }
        query.id = self.next_id;
        self.next_id += 1;
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::usecase::IotGeneratorMaker;

    fn config() -> GeneratorConfig {
        GeneratorConfig {
            start: Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2016, 1, 2, 0, 0, 0).unwrap(),
            scale: 100,
            seed: 1,
        }
    }

    #[derive(Debug)]
    struct Fleet;

    #[derive(Debug)]
    struct FleetQueries;

    impl Backend for Fleet {
        fn name(&self) -> &str {
            "fleet"
        }

        fn as_iot(&self) -> Option<&dyn IotGeneratorMaker> {
            Some(self)
        }
    }

    impl IotGeneratorMaker for Fleet {
        fn new_iot(&self, _config: &GeneratorConfig) -> Result<Box<dyn IotQueries>> {
            Ok(Box::new(FleetQueries))
        }
    }

    impl IotQueries for FleetQueries {
        fn last_location_per_truck(&mut self, query: &mut HighLevelQuery) -> Result<()> {
            query.measurement_name = "readings".to_string();
            query.field_name = "latitude,longitude".to_string();
            query.for_every_n = "name,1".to_string();
            Ok(())
        }

        fn average_load(&mut self, query: &mut HighLevelQuery) -> Result<()> {
            query.measurement_name = "diagnostics".to_string();
            query.field_name = "current_load".to_string();
            query.aggregation_type = "avg".to_string();
            Ok(())
        }
    }

    #[test]
    fn builtin_query_types() {
        let registry = UseCaseRegistry::new().with_builtin_query_types();
        let devops: Vec<_> = registry.query_types(UseCase::Devops).collect();
        assert_eq!(devops.len(), 16);
        assert!(devops.contains(&"single-groupby-5-8-1"));
        assert!(devops.contains(&"cpu-max-all-32-24"));
        assert!(devops.contains(&"lastpoint"));
        assert_eq!(
            registry.query_types(UseCase::Iot).collect::<Vec<_>>(),
            vec!["avg-load", "last-loc"]
        );
    }

    #[test_log::test]
    fn standard_registry_serves_devops_on_cassandra() {
        let registry = UseCaseRegistry::standard().unwrap();
        assert_eq!(registry.backends().collect::<Vec<_>>(), vec!["cassandra"]);

        let mut generator = registry
            .query_generator("cassandra", UseCase::Devops, "single-groupby-1-1-1", &config())
            .unwrap();
        assert_eq!(generator.query_type(), "single-groupby-1-1-1");
        let first = generator.generate().unwrap();
        let second = generator.generate().unwrap();
        assert_eq!((first.id, second.id), (0, 1));
        assert_eq!(first.measurement_name, "cpu");
    }

    #[test]
    fn registering_without_the_capability_fails_fast() {
        let mut registry = UseCaseRegistry::new();
        let err = registry
            .register_backend(Arc::new(CassandraBackend), &[UseCase::Devops, UseCase::Iot])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "use case 'iot' not implemented for backend 'cassandra'"
        );
        assert_eq!(registry.backends().count(), 0);
    }

    #[test]
    fn duplicate_backends_are_rejected() {
        let mut registry = UseCaseRegistry::new();
        registry
            .register_backend(Arc::new(CassandraBackend), &[UseCase::Devops])
            .unwrap();
        assert!(matches!(
            registry.register_backend(Arc::new(CassandraBackend), &[]),
            Err(Error::DuplicateBackend(name)) if name == "cassandra"
        ));
    }

    #[test]
    fn generator_lookup_errors() {
        let registry = UseCaseRegistry::standard().unwrap();
        assert!(matches!(
            registry.query_generator("influx", UseCase::Devops, "lastpoint", &config()),
            Err(Error::UnknownBackend(_))
        ));
        assert!(matches!(
            registry.query_generator("cassandra", UseCase::Iot, "last-loc", &config()),
            Err(Error::UseCaseNotRegistered { .. })
        ));
        let err = registry
            .query_generator("cassandra", UseCase::Devops, "cpu-max-all-2", &config())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid query type for use case 'devops': 'cpu-max-all-2'"
        );
    }

    #[test]
    fn iot_backends_plug_in_through_their_capability() {
        let mut registry = UseCaseRegistry::new().with_builtin_query_types();
        registry
            .register_backend(Arc::new(Fleet), &[UseCase::Iot])
            .unwrap();
        assert!(matches!(
            registry.register_backend(Arc::new(Fleet), &[UseCase::Devops]),
            Err(Error::UseCaseNotImplemented { .. })
        ));

        let mut generator = registry
            .query_generator("fleet", UseCase::Iot, "avg-load", &config())
            .unwrap();
        let query = generator.generate().unwrap();
        assert_eq!(query.measurement_name, "diagnostics");
        assert_eq!(query.aggregation_type, "avg");
    }
}
