//! Schema-aware model of a GraphQL operation.
//!
//! The pipeline never works on `graphql-parser` types directly: the schema is reduced to
//! per-field [`schema::FieldMetadata`] once, and every request is converted into a
//! [`operation::RequestAst`] whose fields carry that metadata.

pub mod operation;
pub mod parser;
pub mod render;
pub mod schema;
pub mod value;
