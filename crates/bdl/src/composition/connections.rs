//! Checks of `connect(source, sinks...)` calls.

use std::collections::HashMap;

use bdl_parser::{Diagnostic, error::ErrorCode};

use crate::{composition::view::Connection, resolver::Resolved};

/// Wires accepted so far in one target.
#[derive(Debug, Default)]
pub(crate) struct Wiring {
    connections: Vec<Connection>,
    sinks: HashMap<String, String>,
}

impl Wiring {
    /// Check and record every wire of one `connect` call.
    ///
    /// Each sink is checked on its own; the diagnostics of the rejected
    /// ones are returned.
    pub(crate) fn connect(&mut self, call: &Resolved) -> Vec<Diagnostic> {
        let Some(source) = call
            .parameter("source")
            .and_then(|parameter| parameter.values().first())
        else {
            return vec![call
                .error("Missing mandatory parameter 'source' for 'connect'.")
                .with_code(ErrorCode::E210)];
        };
        let sinks = call
            .parameter("sinks")
            .map(|parameter| parameter.values())
            .unwrap_or_default();

        let mut diagnostics = Vec::new();
        for sink in sinks {
            match self.wire(source, sink) {
                Ok(connection) => {
                    self.sinks
                        .insert(connection.sink.clone(), connection.source.clone());
                    self.connections.push(connection);
                }
                Err(diagnostic) => diagnostics.push(diagnostic),
            }
        }
        diagnostics
    }

    fn wire(&self, source: &Resolved, sink: &Resolved) -> Result<Connection, Diagnostic> {
        let source_name = describe(source);
        let sink_name = describe(sink);

        if !is_member(source) || source.is_const() {
            return Err(source
                .error(format!("'{source_name}' is not a valid source IO."))
                .with_code(ErrorCode::E401)
                .with_help("a source is a non-const interface member of an instance"));
        }
        if !is_member(sink) || !sink.is_const() {
            return Err(sink
                .error(format!("'{sink_name}' is not a valid sink IO."))
                .with_code(ErrorCode::E400)
                .with_help("a sink is a const interface member of an instance"));
        }
        if source.type_fqn() != sink.type_fqn() {
            return Err(sink
                .error(format!(
                    "Connections must be between the same types, got '{}' and '{}'.",
                    source.type_fqn().unwrap_or("?"),
                    sink.type_fqn().unwrap_or("?")
                ))
                .with_code(ErrorCode::E402)
                .with_labeled(source.label("Source is here.")));
        }
        if let Some(connected) = self.sinks.get(&sink_name) {
            return Err(sink
                .error(format!("'{sink_name}' is already connected to '{connected}'."))
                .with_code(ErrorCode::E403));
        }

        Ok(Connection {
            source: source_name,
            sink: sink_name,
            type_fqn: source.type_fqn().unwrap_or_default().to_string(),
        })
    }

    pub(crate) fn into_connections(self) -> Vec<Connection> {
        self.connections
    }
}

/// A member accessed through an instance.
fn is_member(value: &Resolved) -> bool {
    value.this().is_some() && value.value_fqn().is_some()
}

fn describe(value: &Resolved) -> String {
    value
        .symbol()
        .or(value.value_fqn())
        .unwrap_or("<expression>")
        .to_string()
}
