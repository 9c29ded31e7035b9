//! Mapping tables built at setup and replayed for every event.

use crate::template::TemplateExpression;
use proto_types::{FieldShape, MapEntryTypes, ProtoFieldDescriptor, ProtoMessageDescriptor};
use std::sync::Arc;
use stream_types::AttributeType;

/// Where a sink binding takes its value from.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSource {
    /// The event attribute at the binding's position
    Direct,
    /// A payload template evaluated against the whole event
    Template(TemplateExpression),
}

/// Write handle for one message field, resolved against the descriptor
/// during setup.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutator {
    /// Replace a singular field
    Set { field: ProtoFieldDescriptor },
    /// Merge entries into a map field
    PutAll {
        field: ProtoFieldDescriptor,
        entry_types: MapEntryTypes,
    },
}

impl Mutator {
    pub fn descriptor(&self) -> &ProtoFieldDescriptor {
        match self {
            Mutator::Set { field } | Mutator::PutAll { field, .. } => field,
        }
    }

    pub fn field(&self) -> &str {
        &self.descriptor().name
    }
}

/// Read handle for one message field, chosen by the field's shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Accessor {
    Scalar {
        field: ProtoFieldDescriptor,
        attribute_type: AttributeType,
    },
    List { field: ProtoFieldDescriptor },
    Map { field: ProtoFieldDescriptor },
    Message { field: ProtoFieldDescriptor },
}

impl Accessor {
    pub fn descriptor(&self) -> &ProtoFieldDescriptor {
        match self {
            Accessor::Scalar { field, .. }
            | Accessor::List { field }
            | Accessor::Map { field }
            | Accessor::Message { field } => field,
        }
    }

    pub fn field(&self) -> &str {
        &self.descriptor().name
    }

    pub fn shape(&self) -> FieldShape {
        match self {
            Accessor::Scalar { .. } => FieldShape::Scalar,
            Accessor::List { .. } => FieldShape::RepeatedList,
            Accessor::Map { .. } => FieldShape::Map,
            Accessor::Message { .. } => FieldShape::NestedMessage,
        }
    }
}

/// One position of a mapping table.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBinding<H> {
    pub position: usize,
    pub handle: H,
    pub source: ValueSource,
}

/// Ordered bindings for one stream and one message type.
///
/// Built once during setup; never changes afterwards, so it can be shared
/// freely between threads.
#[derive(Debug, Clone)]
pub struct MappingTable<H> {
    message: Arc<ProtoMessageDescriptor>,
    bindings: Vec<FieldBinding<H>>,
}

impl<H> MappingTable<H> {
    pub(crate) fn new(message: Arc<ProtoMessageDescriptor>, bindings: Vec<FieldBinding<H>>) -> Self {
        debug_assert!(
            {
                let mut positions: Vec<usize> = bindings.iter().map(|b| b.position).collect();
                positions.sort_unstable();
                positions.windows(2).all(|w| w[0] != w[1])
            },
            "binding positions must be unique"
        );
        Self { message, bindings }
    }

    /// The message type this table reads from or writes to.
    pub fn message(&self) -> &Arc<ProtoMessageDescriptor> {
        &self.message
    }

    pub fn bindings(&self) -> &[FieldBinding<H>] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldBinding<H>> {
        self.bindings.iter()
    }
}

impl<'a, H> IntoIterator for &'a MappingTable<H> {
    type Item = &'a FieldBinding<H>;
    type IntoIter = std::slice::Iter<'a, FieldBinding<H>>;

    fn into_iter(self) -> Self::IntoIter {
        self.bindings.iter()
    }
}
