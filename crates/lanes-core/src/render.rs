use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::board::{DropOutcome, LoadState};
use crate::config::Config;
use crate::datetime::{format_local_date, format_local_datetime, format_timestamp};
use crate::projector::{Column, SortOrder};
use crate::task::{Task, TaskPriority};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        let color = cfg.get_bool("color").unwrap_or(true);
        if !color || !io::stdout().is_terminal() {
            return Self::plain();
        }
        Self { color: true }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, columns, state))]
    pub fn print_board(&self, columns: &[Column], sort: SortOrder, state: &LoadState) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_board(out, columns, sort, state)
    }

    pub fn write_board<W: Write>(
        &self,
        mut out: W,
        columns: &[Column],
        sort: SortOrder,
        state: &LoadState,
    ) -> anyhow::Result<()> {
        match state {
            LoadState::Loading => writeln!(out, "{}", self.paint("Loading tasks...", "2"))?,
            LoadState::Ready => {}
            LoadState::Failed(message) => {
                writeln!(out, "{}", self.paint(&format!("Could not load tasks: {message}"), "31"))?;
                writeln!(out)?;
            }
        }

        for (idx, column) in columns.iter().enumerate() {
            if idx > 0 {
                writeln!(out)?;
            }
            let header = format!("{} ({})", column.title(), column.len());
            writeln!(out, "{}", self.paint(&header, "1"))?;

            if column.is_empty() {
                writeln!(out, "  {}", self.paint("No tasks", "2"))?;
                continue;
            }

            let headers = vec![
                "ID".to_string(),
                "Pri".to_string(),
                "Due".to_string(),
                "Title".to_string(),
            ];
            let rows = column
                .tasks
                .iter()
                .map(|task| {
                    vec![
                        self.paint(&task.id.to_string(), "33"),
                        self.paint(task.priority.as_str(), priority_color(task.priority)),
                        task.due_date.map(format_local_date).unwrap_or_default(),
                        task.title.clone(),
                    ]
                })
                .collect();
            write_table(&mut out, headers, rows)?;
        }

        writeln!(out)?;
        writeln!(out, "{}", self.paint(&format!("sorted by {sort}"), "2"))?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task), fields(task_id = task.id))]
    pub fn print_task_info(&self, task: &Task) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_task_info(out, task)
    }

    pub fn write_task_info<W: Write>(&self, mut out: W, task: &Task) -> anyhow::Result<()> {
        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", task.title)?;
        writeln!(out, "status      {}", task.status)?;
        writeln!(
            out,
            "priority    {}",
            self.paint(task.priority.as_str(), priority_color(task.priority))
        )?;
        if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
            writeln!(out, "description {description}")?;
        }
        if let Some(due) = task.due_date {
            writeln!(out, "due         {}", format_local_datetime(due))?;
        }
        writeln!(out, "created     {}", format_timestamp(task.created_on))?;
        writeln!(out, "updated     {}", format_timestamp(task.updated_on))?;
        Ok(())
    }

    pub fn print_drop_outcome(&self, outcome: DropOutcome) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        match outcome {
            DropOutcome::NoChange => writeln!(out, "Nothing to move.")?,
            DropOutcome::Moved { id, status } => {
                writeln!(out, "Moved task {id} to {}.", self.paint(status.label(), "32"))?
            }
            DropOutcome::Rejected { id, status } => writeln!(
                out,
                "{}",
                self.paint(&format!("Task {id} could not be moved to {}.", status.label()), "31")
            )?,
        }
        Ok(())
    }

    pub fn print_line(&self, text: &str) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{text}")?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn priority_color(priority: TaskPriority) -> &'static str {
    match priority {
        TaskPriority::High => "31",
        TaskPriority::Medium => "33",
        TaskPriority::Low => "32",
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    write!(writer, "  ")?;
    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    write!(writer, "  ")?;
    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        write!(writer, "  ")?;
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
