//! Request dispatch and write commands.

use crate::config::NodeConfig;
use crate::error::ServerResult;
use crate::registry::NameRegistry;
use ixcache_core::{DomainSpecificProcessingType, DomainSpecificProcessor, IndexSpec, IndexStore};
use ixcache_protocol::{
    push_exception, DeleteIndexCommand, FilteredIndexDeleteCommand, MetadataPropertyCommand,
    MutationResult, Request, Response, SaveIndexCommand,
};
use ixcache_storage::StorageBackend;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

/// State shared by every request a node serves.
pub struct HandlerContext<B: StorageBackend> {
    /// Node configuration.
    pub config: NodeConfig,
    /// Index pages.
    pub store: IndexStore<B>,
    /// Tag and string-hash names.
    pub names: NameRegistry,
    processors: RwLock<HashMap<u8, Arc<dyn DomainSpecificProcessor>>>,
}

impl<B: StorageBackend> HandlerContext<B> {
    /// Creates a context over `backend`.
    pub fn new(config: NodeConfig, backend: B) -> Self {
        let names = NameRegistry::new(&config.index_types);
        Self {
            config,
            store: IndexStore::new(backend),
            names,
            processors: RwLock::new(HashMap::new()),
        }
    }

    /// Resolves a target index name.
    pub fn resolve(&self, target: &str) -> ServerResult<&IndexSpec> {
        Ok(self.config.index_types.resolve(target)?)
    }

    /// Registers the processor for a domain processing code.
    pub fn register_processor(&self, code: u8, processor: Arc<dyn DomainSpecificProcessor>) {
        self.processors.write().insert(code, processor);
    }

    /// Processor for `kind`, if one is registered.
    pub fn processor(&self, kind: DomainSpecificProcessingType) -> Option<Arc<dyn DomainSpecificProcessor>> {
        match kind {
            DomainSpecificProcessingType::None => None,
            DomainSpecificProcessingType::Custom(code) => {
                let found = self.processors.read().get(&code).cloned();
                if found.is_none() {
                    debug!(code, "no domain processor registered");
                }
                found
            }
        }
    }
}

/// Serves decoded requests.
pub struct RequestHandler<B: StorageBackend> {
    pub(crate) context: Arc<HandlerContext<B>>,
}

impl<B: StorageBackend> RequestHandler<B> {
    /// Creates a handler.
    pub fn new(context: Arc<HandlerContext<B>>) -> Self {
        Self { context }
    }

    /// Serves one request. Failures are reported inside the response.
    pub fn handle(&self, request: Request) -> Response {
        match request {
            Request::Range(q) => Response::Range(self.handle_range(&q)),
            Request::FirstLast(q) => Response::FirstLast(self.handle_first_last(&q)),
            Request::Random(q) => Response::Random(self.handle_random(&q)),
            Request::Contains(q) => Response::Contains(self.handle_contains(&q)),
            Request::Distinct(q) => Response::Distinct(self.handle_distinct(&q)),
            Request::Tag(_) => Response::Tag(self.handle_tag()),
            Request::StringHash(_) => Response::StringHash(self.handle_string_hash()),
            Request::Paged(q) => Response::Paged(self.handle_paged(&q)),
            Request::MetadataProperty(q) => {
                Response::MetadataProperty(self.handle_metadata_property(&q))
            }
            Request::Intersection(q) => Response::Intersection(self.handle_intersection(&q)),
            Request::MultiContains(q) => Response::MultiContains(self.handle_multi_contains(&q)),
            Request::Save(c) => Response::Mutation(self.handle_save(&c)),
            Request::MetadataPropertyUpdate(c) => {
                Response::Mutation(self.handle_metadata_property_update(&c))
            }
            Request::FilteredDelete(c) => Response::Mutation(self.handle_filtered_delete(&c)),
            Request::DeleteIndex(c) => Response::Mutation(self.handle_delete_index(&c)),
        }
    }

    /// Saves into the target index, or into every index when no target is
    /// named. Each index is written atomically; one failing index does not
    /// stop the others.
    pub fn handle_save(&self, command: &SaveIndexCommand) -> MutationResult {
        let mut result = MutationResult::default();
        if let Err(e) = command.validate() {
            result.exception_info = e.to_string();
            return result;
        }
        let specs: Vec<&IndexSpec> = if command.target_index_name.is_empty() {
            self.context.config.index_types.indexes.iter().collect()
        } else {
            match self.context.resolve(&command.target_index_name) {
                Ok(spec) => vec![spec],
                Err(e) => {
                    result.exception_info = e.to_string();
                    return result;
                }
            }
        };

        for spec in specs {
            let batch = command.batch_for(&spec.name);
            match self
                .context
                .store
                .write_index_mutation(&command.index_id, spec, &batch)
            {
                Ok(outcome) => {
                    for line in outcome.exception_text().lines() {
                        push_exception(&mut result.exception_info, &format!("{}: {line}", spec.name));
                    }
                }
                Err(e) => {
                    error!(index_id = %command.index_id, index = %spec.name, error = %e, "save failed");
                    push_exception(&mut result.exception_info, &format!("{}: {e}", spec.name));
                }
            }
        }
        self.context
            .names
            .record(command.add_list.iter().chain(&command.update_list));
        result
    }

    /// Applies a metadata property update.
    pub fn handle_metadata_property_update(&self, command: &MetadataPropertyCommand) -> MutationResult {
        let outcome = self.context.resolve(&command.target_index_name).and_then(|spec| {
            Ok(self
                .context
                .store
                .update_metadata_properties(&command.index_id, spec, &command.update)?)
        });
        match outcome {
            Ok(found) => {
                if !found {
                    debug!(index_id = %command.index_id, "metadata update skipped, index absent");
                }
                MutationResult::default()
            }
            Err(e) => {
                error!(index_id = %command.index_id, error = %e, "metadata property update failed");
                MutationResult {
                    exception_info: e.to_string(),
                }
            }
        }
    }

    /// Removes entries matching the command's filter.
    pub fn handle_filtered_delete(&self, command: &FilteredIndexDeleteCommand) -> MutationResult {
        let outcome = self.context.resolve(&command.target_index_name).and_then(|spec| {
            Ok(self
                .context
                .store
                .filtered_delete(&command.index_id, spec, &command.filter)?)
        });
        match outcome {
            Ok(_) => MutationResult::default(),
            Err(e) => {
                error!(index_id = %command.index_id, error = %e, "filtered delete failed");
                MutationResult {
                    exception_info: e.to_string(),
                }
            }
        }
    }

    /// Drops every index page of the command's IndexId.
    pub fn handle_delete_index(&self, command: &DeleteIndexCommand) -> MutationResult {
        match self.context.store.delete_index(&command.index_id) {
            Ok(_) => MutationResult::default(),
            Err(e) => {
                error!(index_id = %command.index_id, error = %e, "delete index failed");
                MutationResult {
                    exception_info: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ixcache_core::{
        Condition, DataType, IndexId, IndexItem, IndexSpec, IndexTypeConfig, MetadataPropertyCollectionUpdate,
        Operation, PrimarySortInfo, SortBy, SortOrder,
    };
    use ixcache_storage::InMemoryBackend;

    fn handler() -> RequestHandler<InMemoryBackend> {
        let sort = |tag: &str| {
            PrimarySortInfo::by_tag(tag, vec![SortOrder::new(DataType::Int32, SortBy::Desc)])
        };
        let config = NodeConfig::new(
            "n",
            IndexTypeConfig::new(vec![
                IndexSpec::new("ByScore", sort("score")),
                IndexSpec::new("ByTime", sort("time")).with_max_index_size(2),
            ]),
        );
        RequestHandler::new(Arc::new(HandlerContext::new(config, InMemoryBackend::new())))
    }

    fn entry(id: u8, score: i32, time: i32) -> IndexItem {
        IndexItem::new(vec![id])
            .with_tag("score", score.to_le_bytes().to_vec())
            .with_tag("time", time.to_le_bytes().to_vec())
    }

    fn stored(handler: &RequestHandler<InMemoryBackend>, id: &IndexId, name: &str) -> usize {
        let spec = handler.context.resolve(name).unwrap();
        handler
            .context
            .store
            .load(id, spec)
            .unwrap()
            .map_or(0, |index| index.len())
    }

    #[test]
    fn save_without_target_writes_every_index() {
        let handler = handler();
        let id = IndexId::from(1);
        let command = SaveIndexCommand::new(id.clone()).with_add([entry(1, 5, 1), entry(2, 6, 2), entry(3, 7, 3)]);
        let result = handler.handle_save(&command);
        assert!(result.is_ok(), "{}", result.exception_info);
        assert_eq!(stored(&handler, &id, "ByScore"), 3);
        assert_eq!(stored(&handler, &id, "ByTime"), 2);
        assert!(handler.context.names.tags().contains("time"));
    }

    #[test]
    fn save_reports_rejections_and_unknown_target() {
        let handler = handler();
        let id = IndexId::from(1);
        let command = SaveIndexCommand::new(id.clone())
            .with_target("ByScore")
            .with_add([IndexItem::new(vec![9])]);
        let result = handler.handle_save(&command);
        assert!(result.exception_info.starts_with("ByScore: rejected add entry"));

        let command = SaveIndexCommand::new(id).with_target("Nope");
        let result = handler.handle_save(&command);
        assert_eq!(result.exception_info, "invalid target index name - Nope");
    }

    #[test]
    fn filtered_delete_and_drop() {
        let handler = handler();
        let id = IndexId::from(4);
        handler.handle_save(&SaveIndexCommand::new(id.clone()).with_add([entry(1, 5, 1), entry(2, 9, 2)]));
        let filter = Condition::new(
            "score",
            true,
            Operation::GreaterThan,
            6i32.to_le_bytes().to_vec(),
            DataType::Int32,
        )
        .into();
        let result = handler.handle_filtered_delete(&FilteredIndexDeleteCommand {
            index_id: id.clone(),
            target_index_name: String::new(),
            filter,
        });
        assert!(result.is_ok());
        assert_eq!(stored(&handler, &id, "ByScore"), 1);

        assert!(handler
            .handle_delete_index(&DeleteIndexCommand { index_id: id.clone() })
            .is_ok());
        assert_eq!(stored(&handler, &id, "ByScore"), 0);
        assert_eq!(stored(&handler, &id, "ByTime"), 0);
    }

    #[test]
    fn metadata_update_on_absent_index_is_not_an_error() {
        let handler = handler();
        let mut update = MetadataPropertyCollectionUpdate::new();
        update.add_to_add("floor", vec![1]).unwrap();
        let result = handler.handle_metadata_property_update(&MetadataPropertyCommand {
            index_id: IndexId::from(5),
            target_index_name: String::new(),
            update,
        });
        assert!(result.is_ok());
    }
}
