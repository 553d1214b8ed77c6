// Text processing utilities

/// String and text manipulation utilities
pub mod string {
    /// Truncate text to at most `max_chars` characters with ellipsis
    pub fn truncate(text: &str, max_chars: usize) -> String {
        if text.chars().count() <= max_chars {
            text.to_string()
        } else if max_chars <= 3 {
            "...".to_string()
        } else {
            let kept: String = text.chars().take(max_chars - 3).collect();
            format!("{}...", kept)
        }
    }

    /// Word wrap text to specified width, keeping blank lines between
    /// paragraphs
    pub fn word_wrap(text: &str, width: usize) -> Vec<String> {
        if width == 0 {
            return text.lines().map(str::to_string).collect();
        }

        let mut lines = Vec::new();
        for paragraph in text.lines() {
            let mut current_line = String::new();
            let mut current_length = 0;

            for word in paragraph.split_whitespace() {
                let word_len = word.chars().count();

                if current_length == 0 {
                    current_line.push_str(word);
                    current_length = word_len;
                } else if current_length + 1 + word_len <= width {
                    current_line.push(' ');
                    current_line.push_str(word);
                    current_length += 1 + word_len;
                } else {
                    lines.push(std::mem::take(&mut current_line));
                    current_line.push_str(word);
                    current_length = word_len;
                }
            }

            lines.push(current_line);
        }

        lines
    }

    /// Lowercase ASCII slug usable in file names
    pub fn slug(text: &str) -> String {
        let slug = text
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '-'
                }
            })
            .collect::<String>();
        let slug = slug
            .split('-')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("-");
        if slug.is_empty() {
            "untitled".to_string()
        } else {
            slug
        }
    }
}

/// Text formatting utilities
pub mod format {
    /// Format file size in human-readable format
    pub fn format_file_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.1} {}", size, UNITS[unit_index])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(string::truncate("hello", 10), "hello");
        assert_eq!(string::truncate("hello world", 8), "hello...");
        assert_eq!(string::truncate("héllo wörld", 8), "héllo...");
        assert_eq!(string::truncate("hello", 2), "...");
    }

    #[test]
    fn test_word_wrap() {
        let lines = string::word_wrap("one two three four", 9);
        assert_eq!(lines, ["one two", "three", "four"]);

        let lines = string::word_wrap("first para\n\nsecond", 20);
        assert_eq!(lines, ["first para", "", "second"]);
    }

    #[test]
    fn test_slug() {
        assert_eq!(string::slug("Drug AI"), "drug-ai");
        assert_eq!(string::slug("  AIron!! v2 "), "airon-v2");
        assert_eq!(string::slug("???"), "untitled");
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format::format_file_size(512), "512 B");
        assert_eq!(format::format_file_size(2048), "2.0 KB");
        assert_eq!(format::format_file_size(1_572_864), "1.5 MB");
    }
}
