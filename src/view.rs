//! Terminal session view
//!
//! Renders the connecting terminal's metadata as a small bordered table.
//! Output is written to a raw pty, so lines end in `\r\n`.

pub const ENTER_ALT_SCREEN: &str = "\x1b[?1049h\x1b[?25l";
pub const LEAVE_ALT_SCREEN: &str = "\x1b[?25h\x1b[?1049l";
pub const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

const TABLE_WIDTH: usize = 80;
const MIN_TABLE_WIDTH: usize = 40;
const HEADERS: [&str; 3] = ["TERM", "WIDTH", "HEIGHT"];

/// Terminal metadata reported by the client's pty request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionView {
    pub term: String,
    pub width: u32,
    pub height: u32,
}

impl SessionView {
    pub fn new(term: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            term: term.into(),
            width,
            height,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Full-screen frame: clear, then the table.
    pub fn frame(&self) -> String {
        format!("{}{}", CLEAR_SCREEN, self.render())
    }

    pub fn render(&self) -> String {
        let row = [
            self.term.clone(),
            self.width.to_string(),
            self.height.to_string(),
        ];

        let mut widths: Vec<usize> = HEADERS
            .iter()
            .zip(row.iter())
            .map(|(h, v)| h.chars().count().max(v.chars().count()) + 2)
            .collect();

        // Borders take one column per cell plus the closing edge.
        let target = TABLE_WIDTH.min(self.width as usize).max(MIN_TABLE_WIDTH);
        let mut total: usize = widths.iter().sum::<usize>() + widths.len() + 1;
        let columns = widths.len();
        let mut column = 0;
        while total < target {
            widths[column % columns] += 1;
            column += 1;
            total += 1;
        }

        let mut out = String::new();
        out.push_str(&border('┌', '┬', '┐', &widths));
        out.push_str(&cells(&HEADERS.map(String::from), &widths));
        out.push_str(&border('├', '┼', '┤', &widths));
        out.push_str(&cells(&row, &widths));
        out.push_str(&border('└', '┴', '┘', &widths));
        out
    }
}

fn border(left: char, mid: char, right: char, widths: &[usize]) -> String {
    let segments: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    format!("{}{}{}\r\n", left, segments.join(&mid.to_string()), right)
}

fn cells(values: &[String], widths: &[usize]) -> String {
    let padded: Vec<String> = values
        .iter()
        .zip(widths)
        .map(|(value, width)| format!(" {:<pad$}", value, pad = width - 1))
        .collect();
    format!("│{}│\r\n", padded.join("│"))
}
