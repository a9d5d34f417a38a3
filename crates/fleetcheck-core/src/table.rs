//! Plain table with text, csv, html, json and latex renderings


use serde_json::{Map, Value};

/// `style` attribute of rendered html tables
pub const HTML_STYLE: &str = "width: 100%; border-width: 1px; border-collapse: collapse;";

/// A titled table of string cells
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    title: Option<String>,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            title: None,
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Append a row, padding or truncating it to the header width
    pub fn add_row(&mut self, mut row: Vec<String>) {
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Box-drawn text table with a rule between every row
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| cell_width(h)).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell_width(cell));
            }
        }

        // Title spans the whole table; widen the last column if it does not fit
        if let Some(title) = &self.title {
            let inner: usize = widths.iter().map(|w| w + 2).sum::<usize>() + widths.len().saturating_sub(1);
            let needed = title.chars().count() + 2;
            if needed > inner {
                if let Some(last) = widths.last_mut() {
                    *last += needed - inner;
                }
            }
        }

        let rule = |left: char, mid: char, right: char| -> String {
            let mut line = String::new();
            line.push(left);
            for (i, width) in widths.iter().enumerate() {
                if i > 0 {
                    line.push(mid);
                }
                line.push_str(&"─".repeat(width + 2));
            }
            line.push(right);
            line.push('\n');
            line
        };

        let mut out = String::new();
        if let Some(title) = &self.title {
            let inner: usize = widths.iter().map(|w| w + 2).sum::<usize>() + widths.len().saturating_sub(1);
            out.push('┌');
            out.push_str(&"─".repeat(inner));
            out.push_str("┐\n");
            out.push_str(&format!("│{}│\n", center(title, inner)));
            out.push_str(&rule('├', '┬', '┤'));
        } else {
            out.push_str(&rule('┌', '┬', '┐'));
        }

        push_row(&mut out, &self.headers, &widths, true);

        for row in &self.rows {
            out.push_str(&rule('├', '┼', '┤'));
            push_row(&mut out, row, &widths, false);
        }
        out.push_str(&rule('└', '┴', '┘'));
        out
    }

    /// RFC 4180 csv with CRLF line endings
    #[must_use]
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        for row in std::iter::once(&self.headers).chain(&self.rows) {
            let line: Vec<String> = row.iter().map(|cell| csv_field(cell)).collect();
            out.push_str(&line.join(","));
            out.push_str("\r\n");
        }
        out
    }

    /// Html table carrying the report border and style attributes
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("<table border=\"1\" style=\"{HTML_STYLE}\">\n"));
        if let Some(title) = &self.title {
            out.push_str(&format!("    <caption>{}</caption>\n", html_escape(title)));
        }
        out.push_str("    <thead>\n        <tr>\n");
        for header in &self.headers {
            out.push_str(&format!("            <th>{}</th>\n", html_escape(header)));
        }
        out.push_str("        </tr>\n    </thead>\n    <tbody>\n");
        for row in &self.rows {
            out.push_str("        <tr>\n");
            for cell in row {
                let cell = html_escape(cell).replace('\n', "<br>");
                out.push_str(&format!("            <td>{cell}</td>\n"));
            }
            out.push_str("        </tr>\n");
        }
        out.push_str("    </tbody>\n</table>");
        out
    }

    /// Json array: the header list followed by one object per row
    #[must_use]
    pub fn to_json(&self) -> String {
        let mut items = Vec::with_capacity(self.rows.len() + 1);
        items.push(Value::from(self.headers.clone()));
        for row in &self.rows {
            let object: Map<String, Value> = self
                .headers
                .iter()
                .zip(row)
                .map(|(h, cell)| (h.clone(), Value::from(cell.as_str())))
                .collect();
            items.push(Value::Object(object));
        }
        serde_json::to_string_pretty(&Value::Array(items)).unwrap_or_default()
    }

    /// Latex `tabular` environment
    #[must_use]
    pub fn to_latex(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("\\begin{{tabular}}{{{}}}\n", "c".repeat(self.headers.len())));
        for row in std::iter::once(&self.headers).chain(&self.rows) {
            let cells: Vec<String> = row.iter().map(|cell| latex_escape(cell)).collect();
            out.push_str(&format!("{} \\\\\n", cells.join(" & ")));
        }
        out.push_str("\\end{tabular}");
        out
    }
}

fn cell_width(cell: &str) -> usize {
    cell.lines().map(|l| l.chars().count()).max().unwrap_or(0)
}

fn center(text: &str, width: usize) -> String {
    let len = text.chars().count();
    let pad = width.saturating_sub(len);
    let left = pad / 2;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(pad - left))
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize], header: bool) {
    let lines: Vec<Vec<&str>> = cells.iter().map(|c| c.lines().collect()).collect();
    let height = lines.iter().map(Vec::len).max().unwrap_or(0).max(1);

    for line_no in 0..height {
        out.push('│');
        for (i, width) in widths.iter().enumerate() {
            if i > 0 {
                out.push('│');
            }
            let text = lines
                .get(i)
                .and_then(|l| l.get(line_no))
                .copied()
                .unwrap_or("");
            if header {
                out.push_str(&format!(" {} ", center(text, *width)));
            } else {
                let pad = width.saturating_sub(text.chars().count());
                out.push_str(&format!(" {}{} ", text, " ".repeat(pad)));
            }
        }
        out.push_str("│\n");
    }
}

fn csv_field(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn latex_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            '\n' => out.push(' '),
            _ => out.push(c),
        }
    }
    out
}
