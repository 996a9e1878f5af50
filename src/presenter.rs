//! What the user sees.
//!
//! `Presenter` turns the latest detection into a `DisplayState` on a fixed
//! refresh timer. `TerminalView` draws that state, and only redraws when it
//! changes.

use std::io::{self, Write};
use std::sync::Arc;

use crossterm::style::Stylize;
use crossterm::{cursor, queue, terminal};

use crate::detect::DetectionResult;
use crate::labels::{SignCatalog, SignRecord};
use crate::session::PermissionState;

pub const HEADLINE_PREFIX: &str = "Rambu: ";
pub const UNRECOGNIZED_NAME: &str = "Tidak Dikenali";
pub const UNRECOGNIZED_HINT: &str = "Arahkan kamera ke rambu lalu lintas untuk memulai.";
pub const PERMISSION_REQUIRED: &str = "Izin kamera diperlukan untuk menggunakan aplikasi ini.";
pub const PERMISSION_HINT: &str = "Tekan 's' untuk petunjuk membuka pengaturan akses kamera.";
pub const FLASH_UNAVAILABLE: &str = "Flash tidak tersedia.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisplayState {
    Recognized(SignRecord),
    Unrecognized,
    PermissionRequired,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tone {
    /// Recognized sign name.
    Positive,
    /// Unrecognized marker or a blocking notice.
    Negative,
    Plain,
}

/// Text content of a display state, independent of the terminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedState {
    pub prefix: &'static str,
    pub headline: String,
    pub tone: Tone,
    pub body: String,
}

impl DisplayState {
    pub fn render(&self) -> RenderedState {
        match self {
            DisplayState::Recognized(record) => RenderedState {
                prefix: HEADLINE_PREFIX,
                headline: record.localized_name().to_string(),
                tone: Tone::Positive,
                body: record.explanation().to_string(),
            },
            DisplayState::Unrecognized => RenderedState {
                prefix: HEADLINE_PREFIX,
                headline: UNRECOGNIZED_NAME.to_string(),
                tone: Tone::Negative,
                body: UNRECOGNIZED_HINT.to_string(),
            },
            DisplayState::PermissionRequired => RenderedState {
                prefix: "",
                headline: PERMISSION_REQUIRED.to_string(),
                tone: Tone::Plain,
                body: PERMISSION_HINT.to_string(),
            },
        }
    }
}

/// Maps detections to display states.
pub struct Presenter {
    catalog: Arc<SignCatalog>,
    threshold: f32,
    state: DisplayState,
}

impl Presenter {
    pub fn new(catalog: Arc<SignCatalog>, threshold: f32) -> Self {
        Self {
            catalog,
            threshold,
            state: DisplayState::Unrecognized,
        }
    }

    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    /// Recompute the display state.
    ///
    /// A label with no catalog record leaves the current state in place.
    pub fn refresh(&mut self, permission: PermissionState, latest: &DetectionResult) -> &DisplayState {
        if !permission.is_granted() {
            self.state = DisplayState::PermissionRequired;
            return &self.state;
        }
        if self.state == DisplayState::PermissionRequired {
            self.state = DisplayState::Unrecognized;
        }

        match latest.label.as_deref() {
            Some(label) if latest.confidence > self.threshold => match self.catalog.lookup(label) {
                Some(record) => self.state = DisplayState::Recognized(record.clone()),
                None => log::warn!("no sign metadata for label '{}'", label),
            },
            _ => self.state = DisplayState::Unrecognized,
        }
        &self.state
    }
}

/// Draws display states to a terminal, in place when interactive.
pub struct TerminalView {
    interactive: bool,
    drawn_lines: u16,
    last: Option<DisplayState>,
}

impl TerminalView {
    /// `interactive` enables in-place redraws and raw-mode line endings.
    pub fn new(interactive: bool) -> Self {
        Self {
            interactive,
            drawn_lines: 0,
            last: None,
        }
    }

    /// Draw `state` if it differs from the last one drawn. Returns whether
    /// anything was written.
    pub fn show<W: Write>(&mut self, out: &mut W, state: &DisplayState) -> io::Result<bool> {
        if self.last.as_ref() == Some(state) {
            return Ok(false);
        }
        let rendered = state.render();
        if self.interactive {
            if self.drawn_lines > 0 {
                queue!(
                    out,
                    cursor::MoveUp(self.drawn_lines),
                    cursor::MoveToColumn(0),
                    terminal::Clear(terminal::ClearType::FromCursorDown)
                )?;
            }
            let headline = match rendered.tone {
                Tone::Positive => rendered.headline.clone().green().bold(),
                Tone::Negative => rendered.headline.clone().red().bold(),
                Tone::Plain => rendered.headline.clone().bold(),
            };
            write!(out, "{}{}\r\n{}\r\n", rendered.prefix, headline, rendered.body)?;
            self.drawn_lines = 2;
        } else {
            writeln!(out, "{}{}", rendered.prefix, rendered.headline)?;
            writeln!(out, "{}", rendered.body)?;
        }
        out.flush()?;
        self.last = Some(state.clone());
        Ok(true)
    }

    /// Print a one-off message below the current state.
    pub fn notice<W: Write>(&mut self, out: &mut W, text: &str) -> io::Result<()> {
        if self.interactive {
            write!(out, "{}\r\n", text.to_string().yellow())?;
            // Leave the notice on screen; the next state draws below it.
            self.drawn_lines = 0;
            self.last = None;
        } else {
            writeln!(out, "{}", text)?;
        }
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presenter() -> Presenter {
        Presenter::new(Arc::new(SignCatalog::builtin()), 0.7)
    }

    fn detection(label: &str, confidence: f32) -> DetectionResult {
        DetectionResult {
            label: Some(label.to_string()),
            class_index: Some(14),
            confidence,
            sequence: 1,
        }
    }

    #[test]
    fn confident_label_shows_localized_record() {
        let mut presenter = presenter();
        let state = presenter.refresh(PermissionState::Granted, &detection("Stop", 0.95));
        let rendered = state.render();
        assert_eq!(rendered.headline, "Berhenti");
        assert_eq!(rendered.tone, Tone::Positive);
        assert_eq!(rendered.prefix, HEADLINE_PREFIX);
    }

    #[test]
    fn empty_or_weak_result_is_unrecognized() {
        let mut presenter = presenter();
        presenter.refresh(PermissionState::Granted, &detection("Stop", 0.95));
        assert_eq!(
            presenter.refresh(PermissionState::Granted, &DetectionResult::default()),
            &DisplayState::Unrecognized
        );
        assert_eq!(
            presenter.refresh(PermissionState::Granted, &detection("Stop", 0.7)),
            &DisplayState::Unrecognized
        );
        assert_eq!(presenter.state().render().headline, UNRECOGNIZED_NAME);
    }

    #[test]
    fn unknown_label_keeps_previous_state() {
        let mut presenter = presenter();
        presenter.refresh(PermissionState::Granted, &detection("Stop", 0.95));
        let state = presenter.refresh(PermissionState::Granted, &detection("Mystery sign", 0.99));
        assert_eq!(state.render().headline, "Berhenti");
    }

    #[test]
    fn denied_permission_overrides_detection() {
        let mut presenter = presenter();
        assert_eq!(
            presenter.refresh(PermissionState::Denied, &detection("Stop", 0.95)),
            &DisplayState::PermissionRequired
        );
        assert_eq!(
            presenter.refresh(PermissionState::Granted, &DetectionResult::default()),
            &DisplayState::Unrecognized
        );
    }

    #[test]
    fn view_redraws_only_on_change() -> io::Result<()> {
        let mut view = TerminalView::new(false);
        let mut out = Vec::new();
        assert!(view.show(&mut out, &DisplayState::Unrecognized)?);
        assert!(!view.show(&mut out, &DisplayState::Unrecognized)?);
        assert!(view.show(&mut out, &DisplayState::PermissionRequired)?);

        let text = String::from_utf8(out).expect("utf8 output");
        assert!(text.starts_with("Rambu: Tidak Dikenali\n"));
        assert!(text.contains(UNRECOGNIZED_HINT));
        assert!(text.contains(PERMISSION_REQUIRED));
        Ok(())
    }

    #[test]
    fn plain_notice_does_not_repeat_state() -> io::Result<()> {
        let mut view = TerminalView::new(false);
        let mut out = Vec::new();
        view.show(&mut out, &DisplayState::Unrecognized)?;
        view.notice(&mut out, FLASH_UNAVAILABLE)?;
        assert!(!view.show(&mut out, &DisplayState::Unrecognized)?);
        Ok(())
    }
}
