use console::Style;
use serde::Serialize;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let header_row: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_row.join("  ").trim_end());

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("  "));

    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = w)
            })
            .collect();
        println!("{}", cells.join("  ").trim_end());
    }
}

/// Cut `s` to at most `max` characters, marking the cut with `...`.
pub fn truncate(s: &str, max: usize) -> String {
    let flat = s.replace('\n', " ");
    if flat.chars().count() <= max {
        return flat;
    }
    let keep = max.saturating_sub(3);
    let mut out: String = flat.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Keep the first `max` lines of `s`, noting how many were dropped.
pub fn truncate_lines(s: &str, max: usize) -> String {
    let lines: Vec<&str> = s.lines().collect();
    if lines.len() <= max {
        return lines.join("\n");
    }
    let mut out = lines[..max].join("\n");
    out.push_str(&format!("\n... ({} more lines)", lines.len() - max));
    out
}

// ---------------------------------------------------------------------------
// Printer
// ---------------------------------------------------------------------------

/// Terminal rendering of a workflow run: headers, streamed Claude events,
/// step progress and footers.
pub struct Printer {
    out: Mutex<Box<dyn Write + Send>>,
    truncate_lines: usize,
    truncate_length: usize,
}

impl Printer {
    pub fn stdout(truncate_lines: usize, truncate_length: usize) -> Self {
        Self::with_writer(Box::new(std::io::stdout()), truncate_lines, truncate_length)
    }

    pub fn with_writer(
        out: Box<dyn Write + Send>,
        truncate_lines: usize,
        truncate_length: usize,
    ) -> Self {
        Self {
            out: Mutex::new(out),
            truncate_lines,
            truncate_length,
        }
    }

    fn line(&self, s: impl std::fmt::Display) {
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{s}");
            let _ = out.flush();
        }
    }

    pub fn divider(&self) {
        self.line(Style::new().dim().apply_to("─".repeat(60)));
    }

    pub fn command_header(&self, label: &str, prompt: &str) {
        self.divider();
        self.line(format!(
            "{} {}",
            Style::new().bold().cyan().apply_to("▶"),
            Style::new().bold().apply_to(label)
        ));
        self.line(
            Style::new()
                .dim()
                .apply_to(format!("  {}", truncate(prompt, self.truncate_length))),
        );
        self.divider();
    }

    pub fn command_footer(&self, elapsed: Duration, exit_code: i32) {
        self.divider();
        let secs = elapsed.as_secs_f64();
        if exit_code == 0 {
            self.line(Style::new().green().apply_to(format!("✓ Completed in {secs:.1}s")));
        } else {
            self.line(Style::new().red().apply_to(format!(
                "✗ Failed in {secs:.1}s (exit code {exit_code})"
            )));
        }
    }

    pub fn step_start(&self, step: usize, total: usize, workflow: &str) {
        self.line(format!(
            "{} {}",
            Style::new().bold().apply_to(format!("[{step}/{total}]")),
            workflow
        ));
    }

    pub fn session_start(&self, model: Option<&str>) {
        match model {
            Some(m) => self.line(format!("● Session started ({m})")),
            None => self.line("● Session started"),
        }
    }

    pub fn text(&self, text: &str) {
        self.line(text.trim_end());
    }

    pub fn tool_use(
        &self,
        name: &str,
        description: Option<&str>,
        command: Option<&str>,
        file_path: Option<&str>,
    ) {
        let detail = description.or(file_path).unwrap_or_default();
        self.line(format!(
            "{} {}",
            Style::new().yellow().apply_to(format!("⚙ {name}")),
            detail
        ));
        if let Some(cmd) = command {
            self.line(
                Style::new()
                    .dim()
                    .apply_to(format!("  $ {}", truncate(cmd, self.truncate_length))),
            );
        }
    }

    pub fn tool_result(&self, stdout: &str, stderr: &str) {
        if !stdout.trim().is_empty() {
            for l in truncate_lines(stdout.trim_end(), self.truncate_lines).lines() {
                self.line(Style::new().dim().apply_to(format!("  {l}")));
            }
        }
        if !stderr.trim().is_empty() {
            for l in truncate_lines(stderr.trim_end(), self.truncate_lines).lines() {
                self.line(Style::new().red().apply_to(format!("  {l}")));
            }
        }
    }

    pub fn session_end(&self, success: bool, duration_ms: u64, cost_usd: f64) {
        let status = if success { "done" } else { "failed" };
        self.line(format!(
            "● Session {status} ({:.1}s, ${cost_usd:.4})",
            duration_ms as f64 / 1000.0
        ));
    }

    pub fn render(&self, event: &claude_agent::Event) {
        use claude_agent::Event;
        match event {
            Event::SessionStarted { model } => self.session_start(model.as_deref()),
            Event::Text(text) => self.text(text),
            Event::ToolUse {
                name,
                description,
                command,
                file_path,
            } => self.tool_use(
                name,
                description.as_deref(),
                command.as_deref(),
                file_path.as_deref(),
            ),
            Event::ToolResult { stdout, stderr, .. } => self.tool_result(stdout, stderr),
            Event::SessionComplete {
                success,
                duration_ms,
                total_cost_usd,
            } => self.session_end(*success, *duration_ms, *total_cost_usd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            console::strip_ansi_codes(&String::from_utf8_lossy(&self.0.lock().unwrap()))
                .into_owned()
        }
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
        assert_eq!(truncate("line one\nline two", 100), "line one line two");
    }

    #[test]
    fn truncate_lines_counts_dropped() {
        assert_eq!(truncate_lines("a\nb", 5), "a\nb");
        assert_eq!(truncate_lines("a\nb\nc\nd", 2), "a\nb\n... (2 more lines)");
    }

    #[test]
    fn step_and_header_render() {
        let buf = SharedBuf::default();
        let printer = Printer::with_writer(Box::new(buf.clone()), 2, 20);
        printer.step_start(2, 4, "dev-story");
        printer.command_header("dev-story: 6-1-x", "implement the story with all tests passing");
        let out = buf.contents();
        assert!(out.contains("[2/4] dev-story"));
        assert!(out.contains("dev-story: 6-1-x"));
        assert!(out.contains("implement the sto..."));
    }

    #[test]
    fn tool_result_is_truncated() {
        let buf = SharedBuf::default();
        let printer = Printer::with_writer(Box::new(buf.clone()), 2, 60);
        printer.tool_result("1\n2\n3\n4\n", "");
        let out = buf.contents();
        assert!(out.contains("  1\n  2\n"));
        assert!(out.contains("(2 more lines)"));
        assert!(!out.contains("  3"));
    }

    #[test]
    fn footer_reports_exit_code() {
        let buf = SharedBuf::default();
        let printer = Printer::with_writer(Box::new(buf.clone()), 2, 60);
        printer.command_footer(Duration::from_millis(1500), 3);
        assert!(buf.contents().contains("exit code 3"));
    }
}
