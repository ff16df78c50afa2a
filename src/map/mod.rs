//! Map renderer adapter
//!
//! The tracer issues ordered [`MapCommand`]s through [`MapSink`] and does not care
//! whether a renderer is ready. [`DeferredMap`] owns that state: commands submitted
//! before [`DeferredMap::mark_ready`] are queued and flushed once, in order.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::Write;
use std::sync::Mutex;

use crate::DiagError;

/// Command understood by a map renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum MapCommand {
    /// Remove every plotted point
    Clear,
    /// Plot a labelled point; the label is already HTML-escaped
    AddPoint { lat: f64, lon: f64, label: String },
}

/// Fire-and-forget destination for map commands
pub trait MapSink: Send + Sync {
    fn submit(&self, command: MapCommand);
}

/// Something that actually draws commands
pub trait MapRenderer: Send {
    fn render(&mut self, command: &MapCommand) -> crate::Result<()>;
}

/// Sink that drops every command
#[derive(Debug, Clone, Default)]
pub struct NullMap;

impl MapSink for NullMap {
    fn submit(&self, _command: MapCommand) {}
}

struct DeferredState<R> {
    ready: bool,
    pending: VecDeque<MapCommand>,
    renderer: R,
}

/// Ordered command buffer in front of a renderer with a one-time readiness gate
pub struct DeferredMap<R: MapRenderer> {
    state: Mutex<DeferredState<R>>,
}

impl<R: MapRenderer> DeferredMap<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            state: Mutex::new(DeferredState {
                ready: false,
                pending: VecDeque::new(),
                renderer,
            }),
        }
    }

    /// Signal that the renderer can accept commands; flushes the queue.
    ///
    /// Only the first call has an effect.
    pub fn mark_ready(&self) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if state.ready {
            return;
        }
        state.ready = true;

        let DeferredState { pending, renderer, .. } = &mut *state;
        log::debug!("Map ready, flushing {} queued commands", pending.len());
        while let Some(command) = pending.pop_front() {
            render_logged(renderer, &command);
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state.lock().map(|state| state.ready).unwrap_or(false)
    }

    /// Number of commands waiting for readiness
    pub fn pending_len(&self) -> usize {
        self.state.lock().map(|state| state.pending.len()).unwrap_or(0)
    }

    /// Consume the adapter and hand back the renderer
    pub fn into_renderer(self) -> R {
        match self.state.into_inner() {
            Ok(state) => state.renderer,
            Err(poisoned) => poisoned.into_inner().renderer,
        }
    }
}

impl<R: MapRenderer> MapSink for DeferredMap<R> {
    fn submit(&self, command: MapCommand) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if state.ready {
            render_logged(&mut state.renderer, &command);
        } else {
            state.pending.push_back(command);
        }
    }
}

fn render_logged<R: MapRenderer>(renderer: &mut R, command: &MapCommand) {
    if let Err(e) = renderer.render(command) {
        log::warn!("Map renderer rejected {:?}: {}", command, e);
    }
}

/// Renderer writing one JSON object per command, for an external map front end
pub struct JsonLinesRenderer<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonLinesRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> MapRenderer for JsonLinesRenderer<W> {
    fn render(&mut self, command: &MapCommand) -> crate::Result<()> {
        let line = serde_json::to_string(command)?;
        writeln!(self.writer, "{}", line).map_err(|e| DiagError::RendererError(e.to_string()))?;
        self.writer.flush().map_err(|e| DiagError::RendererError(e.to_string()))
    }
}

/// Escape text for embedding in an HTML popup label
pub fn escape_label(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Popup label of a plotted hop: `Hop N: address<br>location`
pub fn hop_label(hop_index: u8, address: &str, geo_label: &str) -> String {
    format!("Hop {}: {}<br>{}", hop_index, escape_label(address), escape_label(geo_label))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<MapCommand>);

    impl MapRenderer for Recorder {
        fn render(&mut self, command: &MapCommand) -> crate::Result<()> {
            self.0.push(command.clone());
            Ok(())
        }
    }

    fn point(label: &str) -> MapCommand {
        MapCommand::AddPoint { lat: 1.0, lon: 2.0, label: label.to_string() }
    }

    #[test]
    fn test_commands_queue_until_ready() {
        let map = DeferredMap::new(Recorder::default());
        map.submit(MapCommand::Clear);
        map.submit(point("a"));
        assert!(!map.is_ready());
        assert_eq!(map.pending_len(), 2);

        map.mark_ready();
        map.submit(point("b"));
        assert_eq!(map.pending_len(), 0);

        let rendered = map.into_renderer().0;
        assert_eq!(rendered, vec![MapCommand::Clear, point("a"), point("b")]);
    }

    #[test]
    fn test_ready_flushes_once() {
        let map = DeferredMap::new(Recorder::default());
        map.submit(point("a"));
        map.mark_ready();
        map.mark_ready();
        assert_eq!(map.into_renderer().0.len(), 1);
    }

    #[test]
    fn test_escape_label() {
        assert_eq!(escape_label("O'Reilly <b>&</b>"), "O&#39;Reilly &lt;b&gt;&amp;&lt;/b&gt;");
        assert_eq!(
            hop_label(3, "8.8.8.8", "US, Mountain View (Google's)"),
            "Hop 3: 8.8.8.8<br>US, Mountain View (Google&#39;s)"
        );
    }

    #[test]
    fn test_json_lines_renderer() {
        let mut renderer = JsonLinesRenderer::new(Vec::new());
        renderer.render(&MapCommand::Clear).unwrap();
        renderer.render(&point("x")).unwrap();

        let output = String::from_utf8(renderer.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], r#"{"command":"clear"}"#);
        assert_eq!(lines[1], r#"{"command":"add_point","lat":1.0,"lon":2.0,"label":"x"}"#);
    }
}
