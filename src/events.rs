//! Event records exchanged between producers and monitors, and the schema that fixes their shape.

use std::fmt;

/// Type of a single event field. All field values are transported as `i64`;
/// the type only constrains which values a producer may put into the field.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FieldTy {
    Int,
    UInt,
    Bool,
}

/// An ordered list of `(name, type)` pairs describing the shape of every event
/// in a monitored system. The schema is fixed once, before compilation, and both
/// the compiler (to resolve program-variable projections) and event producers
/// (to build valid events) work against it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EventSchema {
    fields: Vec<(String, FieldTy)>,
}

impl EventSchema {
    /// Create a schema from the given field list. Field names must be non-empty
    /// and unique.
    pub fn from_fields(fields: Vec<(String, FieldTy)>) -> Result<EventSchema, String> {
        if fields.is_empty() {
            return Err("Event schema must have at least one field".to_string());
        }
        for (i, (name, _)) in fields.iter().enumerate() {
            if name.is_empty() {
                return Err("Event schema contains an unnamed field".to_string());
            }
            if fields[..i].iter().any(|(other, _)| other == name) {
                return Err(format!("Duplicate field '{name}' in the event schema"));
            }
        }
        Ok(EventSchema { fields })
    }

    /// A shortcut to build a schema from string slices.
    pub fn from_slices(fields: &[(&str, FieldTy)]) -> Result<EventSchema, String> {
        Self::from_fields(
            fields
                .iter()
                .map(|(name, ty)| (name.to_string(), *ty))
                .collect(),
        )
    }

    /// Resolve a field name to its index.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(field, _)| field == name)
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[(String, FieldTy)] {
        &self.fields
    }

    /// Build an event from one value per schema field. A wrong number of values
    /// or a value outside of the declared field type is a schema mismatch and
    /// is reported back to the producer.
    pub fn make_event(&self, values: &[i64]) -> Result<Event, String> {
        if values.len() != self.fields.len() {
            return Err(format!(
                "Event has {} values, but the schema declares {} fields",
                values.len(),
                self.fields.len()
            ));
        }
        for (value, (name, ty)) in values.iter().zip(&self.fields) {
            let ok = match ty {
                FieldTy::Int => true,
                FieldTy::UInt => *value >= 0,
                FieldTy::Bool => *value == 0 || *value == 1,
            };
            if !ok {
                return Err(format!(
                    "Value {value} does not fit field '{name}' of type {ty:?}"
                ));
            }
        }
        Ok(Event {
            values: values.to_vec(),
        })
    }
}

/// One observed event: a value for every schema field, in schema order.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Event {
    values: Vec<i64>,
}

impl Event {
    /// Read the value of the field with the given schema index. Indices come
    /// from compilation against the same schema, so an out-of-bounds index is
    /// a programming bug.
    pub fn get(&self, field: usize) -> i64 {
        self.values[field]
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, ")")
    }
}

/// An element of a hypernode-automaton input stream: either a regular event
/// belonging to some trace, or a named action that slices the trace. Actions
/// are referred to by the id they get when the automaton is compiled.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ActionEvent {
    Event(Event),
    Action(usize),
}

impl ActionEvent {
    pub fn is_action(&self) -> bool {
        matches!(self, ActionEvent::Action(_))
    }
}

#[cfg(test)]
mod tests {
    use crate::events::{EventSchema, FieldTy};

    #[test]
    /// Test that schema construction rejects malformed field lists.
    fn schema_validation() {
        assert!(EventSchema::from_slices(&[]).is_err());
        assert!(EventSchema::from_slices(&[("in", FieldTy::Int), ("in", FieldTy::Int)]).is_err());

        let schema =
            EventSchema::from_slices(&[("in", FieldTy::Int), ("out", FieldTy::Int)]).unwrap();
        assert_eq!(schema.field_index("in"), Some(0));
        assert_eq!(schema.field_index("out"), Some(1));
        assert_eq!(schema.field_index("x"), None);
    }

    #[test]
    /// Test that event construction checks arity and field types.
    fn event_construction() {
        let schema =
            EventSchema::from_slices(&[("in", FieldTy::UInt), ("ok", FieldTy::Bool)]).unwrap();

        let event = schema.make_event(&[3, 1]).unwrap();
        assert_eq!(event.get(0), 3);
        assert_eq!(event.get(1), 1);

        assert!(schema.make_event(&[3]).is_err());
        assert!(schema.make_event(&[-1, 0]).is_err());
        assert!(schema.make_event(&[3, 2]).is_err());
    }
}
