//! Remote cursor and selection overlays.
//!
//! Every remote participant with a fully resolvable cursor gets one
//! indicator per visual line of its selection (a single caret indicator
//! for a collapsed one). The last indicator of each participant carries
//! the label.

use crate::awareness::ClientId;
use crate::layout::{MeasureSurface, Rect};
use crate::mirror::ParticipantInfo;
use crate::translator::resolve_cursor;
use coedit_text::ReplicatedText;

/// One rectangle of a participant's overlay, in overlay coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Indicator {
    pub participant: ClientId,
    pub color: String,
    pub rect: Rect,
    pub label: Option<String>,
}

/// Computes overlays relative to a scrolled overlay container.
#[derive(Clone, Debug, Default)]
pub struct OverlayRenderer {
    scroll: (f64, f64),
}

impl OverlayRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow the text area's scroll position.
    pub fn sync_scroll(&mut self, left: f64, top: f64) {
        self.scroll = (left, top);
    }

    pub fn scroll(&self) -> (f64, f64) {
        self.scroll
    }

    /// Indicators for every non-self participant.
    pub fn render<D, M>(
        &self,
        participants: &[ParticipantInfo],
        doc: Option<&D>,
        layout: Option<&M>,
    ) -> Vec<Indicator>
    where
        D: ReplicatedText + ?Sized,
        M: MeasureSurface + ?Sized,
    {
        let (Some(doc), Some(layout)) = (doc, layout) else {
            return Vec::new();
        };
        let text = doc.snapshot_text();

        participants
            .iter()
            .filter(|p| !p.is_self)
            .flat_map(|p| self.render_participant(p, doc, layout, &text))
            .collect()
    }

    /// Indicators for one participant. Empty if the participant has no
    /// cursor, either endpoint is unresolved, or nothing can be measured.
    pub fn render_participant<D, M>(
        &self,
        participant: &ParticipantInfo,
        doc: &D,
        layout: &M,
        text: &str,
    ) -> Vec<Indicator>
    where
        D: ReplicatedText + ?Sized,
        M: MeasureSurface + ?Sized,
    {
        let Some(cursor) = &participant.cursor else {
            return Vec::new();
        };
        let Some((anchor, focus)) = resolve_cursor(cursor, doc) else {
            return Vec::new();
        };
        let Some(bounds) = layout.bounding_rect() else {
            return Vec::new();
        };

        let (start, end) = (anchor.min(focus), anchor.max(focus));
        let rects = layout.client_rects(text, start, end);
        let last = rects.len().saturating_sub(1);

        rects
            .into_iter()
            .enumerate()
            .map(|(i, rect)| Indicator {
                participant: participant.id.clone(),
                color: participant.color.clone(),
                rect: rect.offset(self.scroll.0 - bounds.x, self.scroll.1 - bounds.y),
                label: (i == last).then(|| participant.label().to_string()),
            })
            .collect()
    }
}
