//! Domain Mapper
//!
//! Builds the canonical model from an AsyncAPI document in one pass over its
//! channels. Objects are keyed by name and versions are deduplicated by
//! content, so a well-formed document yields one version per object.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};

use crate::asyncapi::{Channel, Operation, SpecDocument};
use crate::error::{ImportError, Result};
use crate::model::{
    ApplicationContent, CanonicalModel, CatalogObject, DeliveryDescriptor, EnumContent,
    EventApiContent, EventContent, ObjectMap, SchemaContent, VersionContent, VersionRef,
};

/// What the mapper extracts from a document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapperOptions {
    /// Also map publish operations, as events the application consumes
    pub include_publish_operations: bool,
    /// Build an application named after `info.title`
    pub application: bool,
    /// Build an event API named after `info.title`
    pub event_api: bool,
}

/// Maps a parsed document to a [`CanonicalModel`]
pub struct DomainMapper<'a> {
    doc: &'a SpecDocument,
    options: MapperOptions,
}

#[derive(Default)]
struct EventSets {
    produced: BTreeSet<VersionRef>,
    consumed: BTreeSet<VersionRef>,
}

impl<'a> DomainMapper<'a> {
    pub fn new(doc: &'a SpecDocument, options: MapperOptions) -> Self {
        Self { doc, options }
    }

    /// Map every relevant channel.
    ///
    /// Fails with `MalformedSpec` on any unresolvable reference or invalid
    /// structure; there is no partial result.
    pub fn map(&self) -> Result<CanonicalModel> {
        let mut model = CanonicalModel::default();
        let mut sets = EventSets::default();

        for channel in self.doc.channels()? {
            self.map_channel(&channel, &mut model, &mut sets);
        }

        if self.options.application || self.options.event_api {
            let title = self.doc.title().ok_or_else(|| {
                ImportError::MalformedSpec("info.title is required to import an application".into())
            })?;

            if self.options.application {
                let content = ApplicationContent {
                    produced: sets.produced.clone(),
                    consumed: sets.consumed.clone(),
                };
                insert_single(&mut model.applications, title, content);
            }
            if self.options.event_api {
                let content = EventApiContent {
                    produced: sets.consumed.clone(),
                    consumed: sets.produced.clone(),
                };
                insert_single(&mut model.event_apis, title, content);
            }
        }

        info!(
            enums = model.enums.len(),
            schemas = model.schemas.len(),
            events = model.events.len(),
            applications = model.applications.len(),
            event_apis = model.event_apis.len(),
            "Mapped specification to canonical model"
        );

        Ok(model)
    }

    fn selected_operations(&self) -> &'static [Operation] {
        if self.options.include_publish_operations {
            &[Operation::Subscribe, Operation::Publish]
        } else {
            &[Operation::Subscribe]
        }
    }

    fn map_channel(&self, channel: &Channel, model: &mut CanonicalModel, sets: &mut EventSets) {
        let operations = self.selected_operations();
        if !operations.iter().any(|op| channel.has_operation(*op)) {
            debug!(channel = %channel.address, "Skipping channel without selected operations");
            return;
        }

        let mut enum_refs: HashMap<&str, VersionRef> = HashMap::new();
        for (name, values) in channel.enum_parameters() {
            let index = intern(&mut model.enums, name, EnumContent::new(values.iter().cloned()));
            enum_refs.insert(name, VersionRef::local(name, index));
        }

        for op in operations {
            for message in channel.messages(*op) {
                let schema_version = message.payload.as_ref().map(|payload| {
                    let content = SchemaContent::from_value(payload);
                    debug!(
                        schema = %message.schema_name,
                        digest = %content.digest().short(),
                        "Mapped schema"
                    );
                    let index = intern(&mut model.schemas, &message.schema_name, content);
                    VersionRef::local(&message.schema_name, index)
                });

                let delivery = DeliveryDescriptor::from_topic(&channel.address, |name| {
                    enum_refs.get(name).cloned()
                });

                let content = EventContent { schema_version, delivery };
                let index = intern(&mut model.events, &message.name, content);
                let event_ref = VersionRef::local(&message.name, index);

                match op {
                    Operation::Subscribe => sets.produced.insert(event_ref),
                    Operation::Publish => sets.consumed.insert(event_ref),
                };
            }
        }
    }
}

fn intern<C: VersionContent>(objects: &mut ObjectMap<C>, name: &str, content: C) -> usize {
    objects
        .entry(name.to_string())
        .or_insert_with(|| CatalogObject::new(name))
        .intern_version(content)
}

fn insert_single<C: VersionContent>(objects: &mut ObjectMap<C>, name: &str, content: C) {
    let mut object = CatalogObject::new(name);
    object.intern_version(content);
    objects.insert(name.to_string(), object);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AddressLevel, LevelKind};

    const ORDERS: &str = r#"
asyncapi: 2.6.0
info:
  title: Order Service
  version: 1.0.0
channels:
  order/{region}/created:
    parameters:
      region:
        schema:
          type: string
          enum: [US, EU]
    subscribe:
      message:
        name: OrderCreated
        payload:
          type: object
  payment/received:
    publish:
      message:
        name: PaymentReceived
        payload:
          type: object
          properties:
            amount: { type: number }
"#;

    fn map(options: MapperOptions) -> CanonicalModel {
        let doc = SpecDocument::parse(ORDERS).unwrap();
        DomainMapper::new(&doc, options).map().unwrap()
    }

    #[test]
    fn test_maps_subscribe_channels_only_by_default() {
        let model = map(MapperOptions::default());
        assert_eq!(model.enums.len(), 1);
        assert_eq!(model.schemas.len(), 1);
        assert_eq!(model.events.len(), 1);
        assert!(model.applications.is_empty());
        assert!(model.validate().is_ok());

        let region = &model.enums["region"];
        assert_eq!(region.versions[0].content.values, vec!["US", "EU"]);

        let event = &model.events["OrderCreated"].versions[0].content;
        assert_eq!(event.schema_version, Some(VersionRef::local("OrderCreated", 0)));
        assert_eq!(event.delivery.levels.len(), 3);
        assert_eq!(event.delivery.levels[0], AddressLevel::literal("order"));
        assert_eq!(event.delivery.levels[1].kind, LevelKind::Variable);
        assert_eq!(event.delivery.levels[1].enum_version, Some(VersionRef::local("region", 0)));
        assert_eq!(event.delivery.levels[2], AddressLevel::literal("created"));
    }

    #[test]
    fn test_application_and_event_api_membership() {
        let model = map(MapperOptions {
            include_publish_operations: true,
            application: true,
            event_api: true,
        });
        assert_eq!(model.events.len(), 2);

        let app = &model.applications["Order Service"].versions[0].content;
        assert!(app.produced.contains(&VersionRef::local("OrderCreated", 0)));
        assert!(app.consumed.contains(&VersionRef::local("PaymentReceived", 0)));

        let api = &model.event_apis["Order Service"].versions[0].content;
        assert_eq!(api.produced, app.consumed);
        assert_eq!(api.consumed, app.produced);
    }

    #[test]
    fn test_same_schema_on_two_channels_is_one_version() {
        let doc = SpecDocument::parse(
            r##"{
              "asyncapi": "2.0.0",
              "channels": {
                "a/one": { "subscribe": { "message": { "name": "A", "payload": { "$ref": "#/components/schemas/Shared" } } } },
                "b/two": { "subscribe": { "message": { "name": "B", "payload": { "$ref": "#/components/schemas/Shared" } } } }
              },
              "components": { "schemas": { "Shared": { "type": "object" } } }
            }"##,
        )
        .unwrap();
        let model = DomainMapper::new(&doc, MapperOptions::default()).map().unwrap();
        assert_eq!(model.schemas.len(), 1);
        assert_eq!(model.schemas["Shared"].versions.len(), 1);
        assert_eq!(model.events.len(), 2);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_conflicting_payloads_fail_validation() {
        let doc = SpecDocument::parse(
            r#"{
              "asyncapi": "2.0.0",
              "channels": {
                "a": { "subscribe": { "message": { "name": "Same", "payload": { "title": "Body", "type": "object" } } } },
                "b": { "subscribe": { "message": { "name": "Same", "payload": { "title": "Body", "type": "string" } } } }
              }
            }"#,
        )
        .unwrap();
        let model = DomainMapper::new(&doc, MapperOptions::default()).map().unwrap();
        assert_eq!(model.schemas["Body"].versions.len(), 2);
        assert!(matches!(model.validate(), Err(ImportError::InvalidImportSet(_))));
    }

    #[test]
    fn test_application_requires_title() {
        let doc = SpecDocument::parse(r#"{"asyncapi":"2.0.0","channels":{}}"#).unwrap();
        let options = MapperOptions { application: true, ..Default::default() };
        assert!(matches!(
            DomainMapper::new(&doc, options).map(),
            Err(ImportError::MalformedSpec(_))
        ));
    }
}
