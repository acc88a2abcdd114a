//! # coedit demo
//!
//! A standalone CLI that walks through collaborative plain text editing
//! with the coedit SDK. Every editor is a session (shared document plus
//! awareness) bound to an in-memory text surface through a reconciler, so
//! the scenarios show exactly what a textarea would display.
//!
//! ## Sync model
//!
//! ```text
//! editor A ── full document state ──▶ editor B   (merge is idempotent)
//! editor A ── awareness state     ──▶ editor B   (cursor + name + color)
//! editor B: pump() → surface rewritten, local caret restored from anchors
//! ```

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use coedit_sdk::prelude::*;
use coedit_sdk::{selection_css, Indicator};
use colored::*;

// ─── CLI ───────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "coedit-demo")]
#[command(about = "Collaborative plain text editing walkthrough (coedit SDK)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Basic demo: two editors type, sync, and carets follow remote inserts
    Demo,
    /// Conflict scenario: three editors type concurrently, merge-order independence
    Conflict,
    /// Grouped undo: only this editor's recent burst of typing is reverted
    Undo,
    /// Remote cursors and selections drawn under the text
    Overlay,
    /// Leave a room and come back: the cached state is restored
    Rejoin,
    /// Interactive REPL for manual experimentation
    Interactive,
}

// ─── Editor: a simulated participant ──────────────────────────────────────

/// One participant: a session on the room plus the surface showing it.
struct Editor {
    name: String,
    session: Session,
    reconciler: Reconciler<MemorySurface>,
}

impl Editor {
    fn join(room: &Room, name: &str) -> Self {
        let config = EditorConfigBuilder::new().user_name(name).build();
        let session = Session::open(room.clone(), &config);
        let mut reconciler = Reconciler::new(MemorySurface::new());
        reconciler.attach(session.document().clone(), session.awareness().clone());
        if let Err(e) = reconciler.mark_synced() {
            tracing::warn!(error = %e, name, "editor did not go live");
        }
        Self {
            name: name.to_string(),
            session,
            reconciler,
        }
    }

    fn text(&self) -> String {
        self.reconciler.surface().value()
    }

    fn selection(&self) -> (usize, usize) {
        self.reconciler.surface().selection()
    }

    fn select(&mut self, start: usize, end: usize) {
        self.reconciler.surface_mut().move_selection(start, end);
        self.reconciler.on_selection_change();
    }

    /// Put the caret at `at` and type `text`.
    fn type_at(&mut self, at: usize, text: &str) {
        self.select(at, at);
        let change = self.reconciler.surface_mut().replace_selection(text);
        self.apply(change);
    }

    /// Select `start..end` and delete it.
    fn delete(&mut self, start: usize, end: usize) {
        self.select(start, end);
        let change = self.reconciler.surface_mut().replace_selection("");
        self.apply(change);
    }

    fn undo(&mut self) {
        self.apply(LocalDelta::Undo);
    }

    fn redo(&mut self) {
        self.apply(LocalDelta::Redo);
    }

    fn apply(&mut self, change: LocalDelta) {
        if let Err(e) = self.reconciler.apply_local_delta(change) {
            println!("  {} {}: {}", "!".bright_red(), self.name, e);
        }
    }

    /// Merge another editor's document and awareness state into this one.
    fn sync_from(&mut self, other: &Editor) {
        let result = other.session.encode_state().and_then(|state| {
            self.session
                .receive_update(other.session.session_id(), &state)?;
            let presence = other.session.awareness().read().encode_state()?;
            self.session.receive_awareness(&presence)?;
            Ok(())
        });
        if let Err(e) = result {
            println!("  {} sync {} → {}: {}", "!".bright_red(), other.name, self.name, e);
        }
        self.reconciler.pump();
    }
}

// ─── Pretty printing ──────────────────────────────────────────────────────

fn header(text: &str) {
    let bar = "═".repeat(60);
    println!("\n{}", bar.bright_cyan());
    println!("  {}", text.bold().bright_white());
    println!("{}", bar.bright_cyan());
}

fn section(text: &str) {
    println!("\n{} {}", "▸".bright_yellow(), text.bold());
}

fn step(text: &str) {
    println!("  {} {}", "•".bright_green(), text);
}

fn sync_arrow(from: &str, to: &str) {
    println!(
        "  {} {} {} {}",
        from.bright_magenta(),
        "──sync──▶".bright_cyan(),
        to.bright_magenta(),
        "✓".bright_green()
    );
}

/// Paint `text` in a `#rrggbb` participant color.
fn paint(text: &str, hex: &str) -> ColoredString {
    let rgb = hex
        .strip_prefix('#')
        .and_then(|h| u32::from_str_radix(h, 16).ok());
    match rgb {
        Some(v) => text.truecolor((v >> 16) as u8, (v >> 8) as u8, v as u8),
        None => text.normal(),
    }
}

/// The text with the local selection marked: `|` for a caret, `[..]` for a
/// range.
fn with_selection(text: &str, (start, end): (usize, usize)) -> String {
    let mut out = String::new();
    for (i, ch) in text.chars().enumerate() {
        if i == start {
            out.push(if start == end { '|' } else { '[' });
        }
        if i == end && start != end {
            out.push(']');
        }
        out.push(ch);
    }
    let len = text.chars().count();
    if start == len {
        out.push(if start == end { '|' } else { '[' });
    }
    if end == len && start != end {
        out.push(']');
    }
    out
}

fn show_editor(editor: &Editor) {
    let border = "─".repeat(44);
    println!("  ┌{}┐", border);
    println!(
        "  │ {:^42} │",
        format!("Editor: {}", editor.name).bright_yellow().to_string()
    );
    println!("  ├{}┤", border);
    let shown = with_selection(&editor.text(), editor.selection());
    println!("  │ {:<42} │", format!("\"{}\"", shown));
    let (start, end) = editor.selection();
    println!(
        "  │ {:<42} │",
        format!("selection {}..{}  undo:{}", start, end, editor.session.document().read().can_undo())
            .dimmed()
            .to_string()
    );
    println!("  └{}┘", border);
}

/// Draw `editor`'s view of every remote cursor under its text, one marker
/// line per text line. `^` marks a caret, `~` a selected run.
fn show_overlay(editor: &Editor) {
    // One cell per char, one row per line
    let layout = MonospaceLayout::new(1.0, 1.0);
    let indicators = editor.reconciler.indicators(&OverlayRenderer::new(), Some(&layout));

    let text = editor.text();
    for (row, line) in text.split('\n').enumerate() {
        println!("    {}", line);
        let mut markers: Vec<(usize, String, &Indicator)> = indicators
            .iter()
            .filter(|i| i.rect.y as usize == row)
            .map(|i| {
                let width = i.rect.width as usize;
                let mark = if width == 0 { "^".to_string() } else { "~".repeat(width) };
                (i.rect.x as usize, mark, i)
            })
            .collect();
        markers.sort_by_key(|(col, _, _)| *col);

        let mut out = String::new();
        let mut at = 0;
        for (col, mark, indicator) in markers {
            if col < at {
                continue;
            }
            out.push_str(&" ".repeat(col - at));
            out.push_str(&paint(&mark, &indicator.color).to_string());
            at = col + mark.chars().count();
            if let Some(label) = &indicator.label {
                let tag = format!(" {}", label);
                out.push_str(&paint(&tag, &indicator.color).to_string());
                at += tag.chars().count();
            }
        }
        if !out.is_empty() {
            println!("    {}", out);
        }
    }

    for p in editor.reconciler.participants().iter().filter(|p| !p.is_self) {
        let css = selection_css(&p.color, 0.3).unwrap_or_default();
        step(&format!("{} {}  {}", paint("■", &p.color), p.label(), css.dimmed()));
    }
}

fn convergence_result(editors: &[&Editor]) -> bool {
    let converged = editors.windows(2).all(|w| w[0].text() == w[1].text());
    if converged {
        println!(
            "\n  {} {}",
            "✓".bright_green().bold(),
            "ALL EDITORS CONVERGED: every surface shows the same text!"
                .bright_green()
                .bold()
        );
    } else {
        println!(
            "\n  {} {}",
            "✗".bright_red().bold(),
            "DIVERGENCE DETECTED: surfaces differ!".bright_red().bold()
        );
    }
    converged
}

// ─── Demo ──────────────────────────────────────────────────────────────────

fn run_demo() {
    header("DEMO: Shared Text & Carets That Follow Remote Edits");

    let room = Room::generate("demo");
    step(&format!("room {} (cache key {})", room.id, room.cache_key()));

    section("Phase 1: alice types, bob receives");
    let mut alice = Editor::join(&room, "alice");
    let mut bob = Editor::join(&room, "bob");

    alice.type_at(0, "hello");
    step("alice: typed \"hello\", caret at 5");
    bob.sync_from(&alice);
    sync_arrow("alice", "bob");
    show_editor(&alice);
    show_editor(&bob);

    section("Phase 2: bob inserts before alice's caret");
    bob.type_at(0, "X");
    step("bob:   typed \"X\" at 0");
    alice.sync_from(&bob);
    sync_arrow("bob", "alice");
    show_editor(&alice);
    step(&format!(
        "alice's caret moved 5 → {} with the text it was anchored to",
        alice.selection().0
    ));

    section("Phase 3: bob appends after alice's selection");
    alice.select(1, 3);
    step("alice: selects \"he\"");
    bob.type_at(bob.text().chars().count(), " world");
    step("bob:   typed \" world\" at the end");
    alice.sync_from(&bob);
    sync_arrow("bob", "alice");
    show_editor(&alice);

    bob.sync_from(&alice);
    convergence_result(&[&alice, &bob]);
}

// ─── Conflict ──────────────────────────────────────────────────────────────

fn run_conflict() {
    header("CONFLICT: Concurrent Typing, Merge-Order Independence");

    let room = Room::generate("conflict");
    let mut e1 = Editor::join(&room, "node-1");
    let mut e2 = Editor::join(&room, "node-2");
    let mut e3 = Editor::join(&room, "node-3");

    section("Phase 1: shared starting text");
    e1.type_at(0, "The cat sat.");
    e2.sync_from(&e1);
    e3.sync_from(&e1);
    step("node-1: \"The cat sat.\" → node-2, node-3");

    section("Phase 2: three concurrent edits, no syncing");
    e1.type_at(4, "fat ");
    step("node-1: inserts \"fat \" at 4");
    e2.delete(8, 11);
    step("node-2: deletes \"sat\"");
    e2.type_at(8, "slept");
    step("node-2: types \"slept\" in its place");
    e3.type_at(12, " Then it left.");
    step("node-3: appends \" Then it left.\"");

    section("Pre-sync (diverged)");
    show_editor(&e1);
    show_editor(&e2);
    show_editor(&e3);

    section("Phase 3: sync in different orders");
    e1.sync_from(&e2);
    e1.sync_from(&e3);
    sync_arrow("node-2, node-3", "node-1");
    e2.sync_from(&e3);
    e2.sync_from(&e1);
    sync_arrow("node-3, node-1", "node-2");
    e3.sync_from(&e1);
    e3.sync_from(&e2);
    sync_arrow("node-1, node-2", "node-3");

    section("Post-sync");
    show_editor(&e1);
    show_editor(&e2);
    show_editor(&e3);
    convergence_result(&[&e1, &e2, &e3]);
}

// ─── Undo ──────────────────────────────────────────────────────────────────

fn run_undo() {
    header("UNDO: Grouped, Local-Only Undo");

    let room = Room::generate("undo");
    let mut alice = Editor::join(&room, "alice");
    let mut bob = Editor::join(&room, "bob");

    section("Phase 1: bob writes a line, alice receives it");
    bob.type_at(0, "Dear team,");
    alice.sync_from(&bob);
    show_editor(&alice);

    section("Phase 2: alice types three bursts within the capture window");
    for word in [" thanks", " for", " everything"] {
        let end = alice.text().chars().count();
        alice.type_at(end, word);
        step(&format!("alice: typed \"{}\"", word));
    }

    section("Phase 3: bob edits concurrently");
    bob.type_at(0, "> ");
    alice.sync_from(&bob);
    sync_arrow("bob", "alice");
    show_editor(&alice);

    section("Phase 4: alice undoes once");
    alice.undo();
    step("one step removes all three bursts, bob's \"> \" stays");
    show_editor(&alice);

    section("Phase 5: alice redoes");
    alice.redo();
    show_editor(&alice);

    bob.sync_from(&alice);
    convergence_result(&[&alice, &bob]);
}

// ─── Overlay ───────────────────────────────────────────────────────────────

fn run_overlay() {
    header("OVERLAY: Remote Cursors and Selections");

    let room = Room::generate("overlay");
    let mut alice = Editor::join(&room, "alice");
    let mut bob = Editor::join(&room, "bob");
    let mut carol = Editor::join(&room, "carol");

    alice.type_at(0, "fn main() {\n    println!(\"hi\");\n}");
    bob.sync_from(&alice);
    carol.sync_from(&alice);

    section("Phase 1: bob selects `main`, carol puts her caret in the string");
    bob.select(3, 7);
    carol.select(27, 27);
    alice.sync_from(&bob);
    alice.sync_from(&carol);
    step("alice's view:");
    show_overlay(&alice);

    section("Phase 2: alice deletes `main()`, bob's selection loses its anchor");
    alice.delete(3, 9);
    step("alice's view:");
    show_overlay(&alice);
    step("bob's overlay is gone rather than drawn at a wrong offset");

    section("Phase 3: carol leaves the room");
    carol.session.close();
    alice.sync_from(&carol);
    show_overlay(&alice);
}

// ─── Rejoin ────────────────────────────────────────────────────────────────

async fn run_rejoin() {
    header("REJOIN: Durable Cache Across Room Switches");

    let persistence = Arc::new(MemoryPersistence::new());
    let config = EditorConfigBuilder::new().user_name("alice").build();
    let mut editor = CollaborativeEditor::new(MemorySurface::new(), config, persistence.clone());

    let notes = Room::generate("pw");
    let scratch = Room::generate("pw");

    section("Phase 1: join `notes`, type, save");
    if let Err(e) = editor.join(notes.clone()).await {
        println!("  {} join failed: {}", "!".bright_red(), e);
        return;
    }
    let change = editor.surface_mut().replace_selection("remember the milk");
    if let Err(e) = editor.apply_local_delta(change) {
        println!("  {} edit failed: {}", "!".bright_red(), e);
    }
    if let Err(e) = editor.save().await {
        println!("  {} save failed: {}", "!".bright_red(), e);
    }
    step(&format!("surface: \"{}\"", editor.surface().value()));
    step(&format!("cache entries: {}", persistence.len()));

    section("Phase 2: switch to `scratch`");
    if let Err(e) = editor.join(scratch).await {
        println!("  {} join failed: {}", "!".bright_red(), e);
    }
    step(&format!("surface: \"{}\"", editor.surface().value()));

    section("Phase 3: back to `notes`");
    if let Err(e) = editor.join(notes).await {
        println!("  {} join failed: {}", "!".bright_red(), e);
    }
    let restored = editor.surface().value();
    step(&format!("surface: \"{}\"", restored));

    if restored == "remember the milk" {
        println!("\n  {} {}", "✓".bright_green().bold(), "STATE RESTORED FROM CACHE".bright_green().bold());
    } else {
        println!("\n  {} {}", "✗".bright_red().bold(), "CACHED STATE WAS LOST".bright_red().bold());
    }
    editor.leave();
}

// ─── Interactive ───────────────────────────────────────────────────────────

fn run_interactive() {
    header("INTERACTIVE REPL: coedit SDK");

    let room = Room::generate("repl");
    let mut editors: BTreeMap<String, Editor> = BTreeMap::new();

    println!();
    println!("  {}", "Commands:".bold().underline());
    println!("    {} <name>                   Join a new editor", "editor".bright_cyan());
    println!("    {} <name> <pos> <text..>      Type text at pos", "type".bright_cyan());
    println!("    {} <name> <start> <end>        Delete a range", "del".bright_cyan());
    println!("    {} <name> <start> <end>        Select a range", "sel".bright_cyan());
    println!("    {} <name>                     Undo", "undo".bright_cyan());
    println!("    {} <name>                     Redo", "redo".bright_cyan());
    println!("    {} <from> <to>                Merge from → to", "sync".bright_cyan());
    println!("    {}                          Sync everyone with everyone", "syncall".bright_cyan());
    println!("    {} [name]                     Show editors", "show".bright_cyan());
    println!("    {} <name>                  Show remote cursors", "overlay".bright_cyan());
    println!("    {}                          Exit", "quit".bright_cyan());
    println!();

    loop {
        print!("{}", "coedit> ".bright_cyan().bold());
        let _ = io::stdout().flush();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() || input.is_empty() {
            break;
        }
        let parts: Vec<&str> = input.split_whitespace().collect();
        let Some(command) = parts.first() else {
            continue;
        };
        let num = |i: usize| parts.get(i).and_then(|s| s.parse::<usize>().ok());

        match *command {
            "editor" | "e" => match parts.get(1) {
                Some(name) if editors.contains_key(*name) => {
                    println!("  {} Editor '{}' already exists", "!".bright_yellow(), name)
                }
                Some(name) => {
                    editors.insert(name.to_string(), Editor::join(&room, name));
                    step(&format!("'{}' joined", name));
                }
                None => println!("  {} Usage: editor <name>", "!".bright_red()),
            },

            "type" | "t" => match (parts.get(1).and_then(|n| editors.get_mut(*n)), num(2)) {
                (Some(editor), Some(pos)) if parts.len() > 3 => {
                    let pos = pos.min(editor.text().chars().count());
                    editor.type_at(pos, &parts[3..].join(" "));
                    show_editor(editor);
                }
                _ => println!("  {} Usage: type <name> <pos> <text..>", "!".bright_red()),
            },

            "del" | "d" => match (parts.get(1).and_then(|n| editors.get_mut(*n)), num(2), num(3)) {
                (Some(editor), Some(start), Some(end)) => {
                    editor.delete(start, end);
                    show_editor(editor);
                }
                _ => println!("  {} Usage: del <name> <start> <end>", "!".bright_red()),
            },

            "sel" => match (parts.get(1).and_then(|n| editors.get_mut(*n)), num(2), num(3)) {
                (Some(editor), Some(start), Some(end)) => {
                    editor.select(start, end);
                    show_editor(editor);
                }
                _ => println!("  {} Usage: sel <name> <start> <end>", "!".bright_red()),
            },

            "undo" | "redo" => match parts.get(1).and_then(|n| editors.get_mut(*n)) {
                Some(editor) => {
                    if *command == "undo" {
                        editor.undo();
                    } else {
                        editor.redo();
                    }
                    show_editor(editor);
                }
                None => println!("  {} Usage: {} <name>", "!".bright_red(), command),
            },

            "sync" | "s" => {
                let (Some(from), Some(to)) = (parts.get(1), parts.get(2)) else {
                    println!("  {} Usage: sync <from> <to>", "!".bright_red());
                    continue;
                };
                if from == to || !editors.contains_key(*from) {
                    println!("  {} Unknown or identical editors", "!".bright_red());
                    continue;
                }
                // Take the target out so both can be borrowed
                match editors.remove(*to) {
                    Some(mut target) => {
                        if let Some(source) = editors.get(*from) {
                            target.sync_from(source);
                            sync_arrow(from, to);
                        }
                        show_editor(&target);
                        editors.insert(to.to_string(), target);
                    }
                    None => println!("  {} Unknown editor '{}'", "!".bright_red(), to),
                }
            }

            "syncall" => {
                let names: Vec<String> = editors.keys().cloned().collect();
                for _ in 0..2 {
                    for to in &names {
                        let Some(mut target) = editors.remove(to) else {
                            continue;
                        };
                        for source in editors.values() {
                            target.sync_from(source);
                        }
                        editors.insert(to.clone(), target);
                    }
                }
                let all: Vec<&Editor> = editors.values().collect();
                convergence_result(&all);
            }

            "show" | "list" | "l" => match parts.get(1) {
                Some(name) => match editors.get(*name) {
                    Some(editor) => show_editor(editor),
                    None => println!("  {} Unknown editor '{}'", "!".bright_red(), name),
                },
                None => editors.values().for_each(show_editor),
            },

            "overlay" | "o" => match parts.get(1).and_then(|n| editors.get(*n)) {
                Some(editor) => show_overlay(editor),
                None => println!("  {} Usage: overlay <name>", "!".bright_red()),
            },

            "quit" | "exit" | "q" => break,

            other => println!("  {} Unknown command '{}'", "!".bright_red(), other),
        }
    }

    for editor in editors.values() {
        editor.session.close();
    }
    println!("  {}", "bye".dimmed());
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo => run_demo(),
        Commands::Conflict => run_conflict(),
        Commands::Undo => run_undo(),
        Commands::Overlay => run_overlay(),
        Commands::Rejoin => run_rejoin().await,
        Commands::Interactive => run_interactive(),
    }
}
