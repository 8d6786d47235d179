//! State store: schema, field descriptors, and the store itself.

mod schema;
mod store;

pub use schema::{DefaultValue, FieldDescriptor, Reducer, Schema, SchemaBuilder};
pub use store::{StateStore, SubscriptionId};
