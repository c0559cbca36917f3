use super::elements::{Element, ElementKind, ElementSet};

/// Splits a whole file into `Module` elements of at most `max_chunk_size` bytes.
///
/// Lines are never split; a single line longer than the budget becomes its
/// own chunk. Whitespace-only pieces are dropped.
pub fn split_into_module_chunks(source: &str, max_chunk_size: usize) -> ElementSet {
    let mut set = ElementSet::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_size = 0;
    let mut start_line = 0;

    for (line_no, line) in source.split('\n').enumerate() {
        let line_size = line.len() + 1;
        if current_size + line_size > max_chunk_size && !current.is_empty() {
            push_chunk(&mut set, &current, start_line);
            current.clear();
            current_size = 0;
            start_line = line_no;
        }
        current.push(line);
        current_size += line_size;
    }

    if !current.is_empty() {
        push_chunk(&mut set, &current, start_line);
    }

    set
}

fn push_chunk(set: &mut ElementSet, lines: &[&str], start_line: usize) {
    let text = lines.join("\n");
    if text.trim().is_empty() {
        return;
    }
    let position = set.len();
    set.push(Element {
        kind: ElementKind::Module,
        name: format!("module_{position}"),
        source_text: text,
        docstring: None,
        comments: Vec::new(),
        parent_class: None,
        start_line,
        end_line: start_line + lines.len() - 1,
    });
}
