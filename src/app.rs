//! Main application UI and state management.
//! Handles card authoring, the simulated calendar, matrix import/export and
//! driving review sessions.

use chrono::{DateTime, Utc};
use eframe::egui;
use sm5_review::config::Config;
use sm5_review::database::{CardStore, MatrixStore, SqliteStore};
use sm5_review::export::json::{export_matrix_to_path, import_matrix};
use sm5_review::models::difficulty_matrix::{self, SharedMatrix};
use sm5_review::models::{
    ItemProperties, ItemVariant, Node, Phase, Reveal, ReviewItem, ReviewSession, SessionSummary,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{info, warn};

const CLOZE_OPEN: &str = "{{cloze ";
const CLOZE_CLOSE: &str = "}}";
const CLOZE_PLACEHOLDER: &str = "[...]";

/// Renders `{{cloze ...}}` spans either masked or as their inner text.
pub fn render_cloze(text: &str, mask: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(CLOZE_OPEN) {
        let inner_start = start + CLOZE_OPEN.len();
        let Some(len) = rest[inner_start..].find(CLOZE_CLOSE) else {
            break;
        };
        out.push_str(&rest[..start]);
        if mask {
            out.push_str(CLOZE_PLACEHOLDER);
        } else {
            out.push_str(rest[inner_start..inner_start + len].trim());
        }
        rest = &rest[inner_start + len + CLOZE_CLOSE.len()..];
    }
    out.push_str(rest);
    out
}

/// Formats a timestamp as YYYY-MM-DD
fn format_date(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d").to_string()
}

/// Application screen states
#[derive(Default)]
enum AppScreen {
    #[default]
    Main,
    Review,
}

/// A card row shown on the main screen
struct CardRow {
    item: ReviewItem,
    node: Node,
    properties: ItemProperties,
}

/// Main application state
pub struct ReviewApp {
    show_confirmation_dialog: bool,
    allowed_to_close: bool,
    store: Arc<SqliteStore>,
    matrix: SharedMatrix,
    matrix_store: Arc<dyn MatrixStore>,
    config: Config,

    cards: Vec<CardRow>,
    new_question: String,
    new_answer: String,
    new_variant: ItemVariant,
    preview: bool,

    current_screen: AppScreen,
    session: Option<ReviewSession>,
    finished: Rc<RefCell<Option<SessionSummary>>>,

    current_date: DateTime<Utc>,

    show_result_dialog: bool,
    result_message: String,
}

impl eframe::App for ReviewApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        match self.current_screen {
            AppScreen::Main => self.render_main_screen(ctx),
            AppScreen::Review => self.render_review_screen(ctx),
        }

        // Handle window close requests with confirmation dialog
        if ctx.input(|i| i.viewport().close_requested()) && !self.allowed_to_close {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            self.show_confirmation_dialog = true;
        }

        if self.show_confirmation_dialog {
            egui::Window::new("Do you want to quit?")
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.horizontal(|ui| {
                        if ui.button("No").clicked() {
                            self.show_confirmation_dialog = false;
                            self.allowed_to_close = false;
                        }

                        if ui.button("Yes").clicked() {
                            self.show_confirmation_dialog = false;
                            self.allowed_to_close = true;
                            // closing mid-batch still completes the session
                            if let Some(session) = self.session.as_mut() {
                                session.end();
                            }
                            ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
                        }
                    });
                });
        }

        if self.show_result_dialog {
            egui::Window::new("Result")
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.label(&self.result_message);
                    ui.add_space(10.0);
                    if ui.button("OK").clicked() {
                        self.show_result_dialog = false;
                    }
                });
        }
    }
}

impl ReviewApp {
    pub fn new(
        store: Arc<SqliteStore>,
        matrix: SharedMatrix,
        matrix_store: Arc<dyn MatrixStore>,
        config: Config,
    ) -> Self {
        let current_date = store.get_current_date().unwrap_or_else(|_| Utc::now());
        let preview = config.review.start_read_only;
        let mut app = Self {
            show_confirmation_dialog: false,
            allowed_to_close: false,
            store,
            matrix,
            matrix_store,
            config,
            cards: Vec::new(),
            new_question: String::new(),
            new_answer: String::new(),
            new_variant: ItemVariant::Sided,
            preview,
            current_screen: AppScreen::Main,
            session: None,
            finished: Rc::new(RefCell::new(None)),
            current_date,
            show_result_dialog: false,
            result_message: String::new(),
        };
        app.refresh_cards();
        app
    }

    fn show_result(&mut self, message: String) {
        self.result_message = message;
        self.show_result_dialog = true;
    }

    fn refresh_cards(&mut self) {
        let rows = self.store.list_cards().and_then(|cards| {
            cards
                .into_iter()
                .map(|(item, node)| {
                    let properties = ItemProperties::from_map(&self.store.read_properties(&node)?);
                    Ok(CardRow {
                        item,
                        node,
                        properties,
                    })
                })
                .collect::<sm5_review::Result<Vec<_>>>()
        });
        match rows {
            Ok(rows) => self.cards = rows,
            Err(e) => warn!("Failed to load cards: {}", e),
        }
    }

    fn due_count(&self) -> usize {
        self.cards
            .iter()
            .filter(|row| row.properties.is_due(self.current_date))
            .count()
    }

    /// Renders the main screen with the card list and authoring form
    fn render_main_screen(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(format_date(self.current_date));

                if ui.button("Next Day").clicked() {
                    match self.store.advance_day() {
                        Ok(next) => self.current_date = next,
                        Err(e) => self.show_result(format!("Failed to advance day: {}", e)),
                    }
                }
            });
            ui.separator();

            ui.horizontal(|ui| {
                if ui.button("Export Matrix").clicked() {
                    self.handle_export();
                }
                if ui.button("Import Matrix").clicked() {
                    self.handle_import();
                }
            });

            ui.separator();

            ui.heading("New Card");
            ui.horizontal(|ui| {
                ui.label("Question:");
                ui.text_edit_singleline(&mut self.new_question);
            });
            ui.horizontal(|ui| {
                ui.label("Answer:");
                ui.text_edit_singleline(&mut self.new_answer);
            });
            ui.horizontal(|ui| {
                ui.radio_value(&mut self.new_variant, ItemVariant::Sided, "Sided");
                ui.radio_value(&mut self.new_variant, ItemVariant::Cloze, "Cloze");
            });
            if ui.button("Add Card").clicked() && !self.new_question.is_empty() {
                match self
                    .store
                    .add_card(&self.new_question, &self.new_answer, self.new_variant)
                {
                    Ok(_) => {
                        self.new_question.clear();
                        self.new_answer.clear();
                        self.refresh_cards();
                    }
                    Err(e) => self.show_result(format!("Failed to add card: {}", e)),
                }
            }

            ui.separator();

            let due = self.due_count();
            let mut action_review = false;
            ui.horizontal(|ui| {
                ui.heading(format!("Cards ({}, {} due)", self.cards.len(), due));
                ui.checkbox(&mut self.preview, "Preview only");
                if ui
                    .add_enabled(due > 0, egui::Button::new("Review"))
                    .clicked()
                {
                    action_review = true;
                }
            });

            egui::ScrollArea::vertical()
                .id_salt("cards_list")
                .max_height(300.0)
                .show(ui, |ui| {
                    for row in &self.cards {
                        ui.group(|ui| {
                            ui.label(format!(
                                "{} [{}]",
                                render_cloze(&row.node.content, false),
                                row.item.variant().as_str()
                            ));
                            let next = row
                                .properties
                                .next_scheduled_at
                                .map(format_date)
                                .unwrap_or_else(|| "new".to_string());
                            ui.label(format!(
                                "   repeats: {}  ease: {:.2}  next: {}",
                                row.properties.repetitions, row.properties.easiness_factor, next
                            ));
                        });
                    }
                });

            if action_review {
                self.start_review_session();
            }
        });
    }

    /// Renders the node tree for one reveal phase
    fn render_reveal(ui: &mut egui::Ui, reveal: &Reveal) {
        ui.heading(render_cloze(&reveal.root.content, reveal.config.mask_cloze));
        for node in &reveal.descendants {
            ui.label(render_cloze(&node.content, reveal.config.mask_cloze));
        }
    }

    /// Renders the review screen with the current card and scoring controls
    fn render_review_screen(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(session) = self.session.as_mut() else {
                self.current_screen = AppScreen::Main;
                return;
            };

            if session.is_complete() {
                ui.heading("Batch finished");
                let summary = self.finished.borrow().clone().unwrap_or_default();
                ui.label(summary.to_string());
                for (q, count) in summary.scores.iter().enumerate() {
                    ui.label(format!("   score {}: {}", q, count));
                }

                ui.add_space(20.0);
                if ui.button("Back to Main Screen").clicked() {
                    self.session = None;
                    self.current_screen = AppScreen::Main;
                    self.refresh_cards();
                }
                return;
            }

            let mode = if session.is_read_only() { " (preview)" } else { "" };
            ui.label(format!(
                "Card {} / {}{}",
                session.position(),
                session.len(),
                mode
            ));
            ui.add_space(20.0);

            ui.group(|ui| {
                ui.set_min_height(200.0);
                ui.vertical_centered(|ui| match session.reveal_current() {
                    Ok(reveal) => Self::render_reveal(ui, &reveal),
                    Err(e) => {
                        ui.label(format!("Cannot show card: {}", e));
                    }
                });
            });

            ui.add_space(20.0);

            // Store actions to execute after UI rendering
            let mut action_toggle = false;
            let mut action_score: Option<u8> = None;
            let mut action_skip = false;
            let mut action_reset = false;
            let mut action_end = false;

            let answer_shown = session.phase() == Phase::Answer;
            let writable = !session.is_read_only();

            let toggle_label = if answer_shown { "Hide Answer" } else { "Show Answer" };
            if ui.button(toggle_label).clicked() {
                action_toggle = true;
            }

            if answer_shown && writable {
                ui.label("Rate your response:");
                ui.horizontal(|ui| {
                    let failing = [
                        (0, "0 - Blackout"),
                        (1, "1 - Wrong"),
                        (2, "2 - Wrong (familiar)"),
                    ];
                    for (q, label) in failing {
                        if ui.button(label).clicked() {
                            action_score = Some(q);
                        }
                    }
                });
                ui.horizontal(|ui| {
                    let passing = [(3, "3 - Difficult"), (4, "4 - Correct"), (5, "5 - Perfect")];
                    for (q, label) in passing {
                        if ui.button(label).clicked() {
                            action_score = Some(q);
                        }
                    }
                });
                if ui.button("Skip").clicked() {
                    action_skip = true;
                }
            }

            ui.add_space(20.0);
            ui.horizontal(|ui| {
                if writable && ui.button("Reset Card").clicked() {
                    action_reset = true;
                }
                if ui.button("End Session").clicked() {
                    action_end = true;
                }
            });

            // Execute deferred actions
            let result = if action_toggle {
                if answer_shown {
                    session.hide();
                } else {
                    session.reveal();
                }
                Ok(())
            } else if let Some(quality) = action_score {
                session.score(quality, self.current_date)
            } else if action_skip {
                session.skip()
            } else if action_reset {
                session.reset()
            } else {
                if action_end {
                    session.end();
                }
                Ok(())
            };

            if let Err(e) = result {
                self.show_result(format!("Action failed: {}", e));
            }
        });
    }

    /// Starts a review session over the items due today
    fn start_review_session(&mut self) {
        let due = match self
            .store
            .due_items(self.current_date, self.config.review.cards_limit)
        {
            Ok(due) => due,
            Err(e) => {
                self.show_result(format!("Failed to load due cards: {}", e));
                return;
            }
        };
        if due.is_empty() {
            return;
        }

        self.finished.replace(None);
        let sink = Rc::clone(&self.finished);
        let session = ReviewSession::new(
            due,
            Arc::clone(&self.store) as Arc<dyn CardStore>,
            Arc::clone(&self.matrix),
            Arc::clone(&self.matrix_store),
            self.preview,
        )
        .map(|session| {
            session.with_completion(move |tally| {
                sink.replace(Some(SessionSummary::from_tally(tally)));
            })
        });

        match session {
            Ok(session) => {
                self.session = Some(session);
                self.current_screen = AppScreen::Review;
            }
            Err(e) => self.show_result(format!("Failed to start session: {}", e)),
        }
    }

    /// Handles matrix export to a JSON file
    fn handle_export(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .set_file_name("difficulty-matrix.json")
            .add_filter("JSON files", &["json"])
            .save_file()
        else {
            return;
        };

        let result = difficulty_matrix::snapshot(&self.matrix)
            .and_then(|matrix| export_matrix_to_path(&matrix, &path).map(|_| matrix.len()));
        match result {
            Ok(entries) => {
                self.show_result(format!("Exported {} matrix entries.", entries))
            }
            Err(e) => self.show_result(format!("Export failed: {}", e)),
        }
    }

    /// Handles matrix import from a JSON file, replacing the current matrix
    fn handle_import(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON files", &["json"])
            .pick_file()
        else {
            return;
        };

        let result = import_matrix(&path).and_then(|matrix| {
            let entries = matrix.len();
            difficulty_matrix::commit(&self.matrix, matrix)?;
            difficulty_matrix::flush(&self.matrix, self.matrix_store.as_ref())?;
            Ok(entries)
        });
        match result {
            Ok(entries) => {
                info!("Replaced difficulty matrix from {}", path.display());
                self.show_result(format!("Imported {} matrix entries.", entries));
            }
            Err(e) => self.show_result(format!(
                "Import failed: {}\n\nExpected a JSON array of\n\
                 {{\"repetitions\", \"easiness_factor\", \"optimal_factor\"}} objects.",
                e
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_cloze_masked() {
        assert_eq!(
            render_cloze("The capital of {{cloze Poland}} is {{cloze Warsaw}}.", true),
            "The capital of [...] is [...]."
        );
    }

    #[test]
    fn test_render_cloze_revealed() {
        assert_eq!(
            render_cloze("The capital of {{cloze Poland}} is {{cloze Warsaw}}.", false),
            "The capital of Poland is Warsaw."
        );
    }

    #[test]
    fn test_render_cloze_unterminated() {
        assert_eq!(render_cloze("broken {{cloze span", true), "broken {{cloze span");
        assert_eq!(render_cloze("plain text", true), "plain text");
    }
}
