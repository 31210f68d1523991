use code_blocks::{BlockEvent, CodeBlockExtractor, FileInstruction};
use pretty_assertions::assert_eq;

fn collect(events: &[BlockEvent]) -> (String, Vec<FileInstruction>) {
    let mut display = String::new();
    let mut instructions = Vec::new();
    for event in events {
        match event {
            BlockEvent::Text(chunk) => display.push_str(chunk),
            BlockEvent::File(instruction) => instructions.push(instruction.clone()),
        }
    }
    (display, instructions)
}

fn run_chunked(input: &str, split: usize) -> (String, Vec<FileInstruction>) {
    let mut extractor = CodeBlockExtractor::new();
    let mut events = extractor.feed(&input[..split]);
    events.extend(extractor.feed(&input[split..]));
    events.extend(extractor.flush());
    collect(&events)
}

/// After flush, the concatenated display text and the ordered instruction
/// list must not depend on how the input was split into deltas.
fn assert_chunk_invariant(input: &str) {
    let expected = collect(&CodeBlockExtractor::extract_all(input));

    for split in 0..=input.len() {
        if !input.is_char_boundary(split) {
            continue;
        }
        assert_eq!(run_chunked(input, split), expected, "split at byte {split}");
    }

    let mut extractor = CodeBlockExtractor::new();
    let mut events = Vec::new();
    let mut buffer = [0u8; 4];
    for ch in input.chars() {
        events.extend(extractor.feed(ch.encode_utf8(&mut buffer)));
    }
    events.extend(extractor.flush());
    assert_eq!(collect(&events), expected, "char-by-char on {input:?}");
}

#[test]
fn streamed_block_is_absorbed_from_display_and_emitted_once() {
    let mut extractor = CodeBlockExtractor::new();
    let mut events = extractor.feed("Sure, here:\n```py");
    events.extend(extractor.feed("thon:app.py\nprint(1)\n"));
    assert!(
        events.iter().all(|event| matches!(event, BlockEvent::Text(_))),
        "no instruction may be emitted before the closing fence"
    );
    events.extend(extractor.feed("```\nDone."));
    events.extend(extractor.flush());

    let (display, instructions) = collect(&events);
    assert_eq!(display, "Sure, here:\n\nDone.");
    assert_eq!(
        instructions,
        vec![FileInstruction {
            path: "app.py".to_string(),
            language: "python".to_string(),
            content: "print(1)".to_string(),
        }]
    );
}

#[test]
fn output_is_invariant_under_chunking() {
    let inputs = [
        "plain text with no fences at all",
        "Sure, here:\n```python:app.py\nprint(1)\n```\nDone.",
        "a\n```rs:src/é.rs\nlet x = \"→\";\n```\ntail",
        "```a:x\n1\n```\n```b:y\n2\n```",
        "edge ```py:unclosed\nbody",
        "tick ` and double `` and a bare colon: not a fence",
    ];
    for input in inputs {
        assert_chunk_invariant(input);
    }
}

#[test]
fn overlong_withheld_suffix_is_invariant_too() {
    let input = format!("```{}", "a".repeat(120));
    assert_chunk_invariant(&input);
}

#[test]
fn text_without_blocks_passes_through_unchanged() {
    let input = "no code here, just prose.\nsecond line.\n";
    let (display, instructions) = collect(&CodeBlockExtractor::extract_all(input));
    assert_eq!(display, input);
    assert!(instructions.is_empty());
}

#[test]
fn plain_language_fence_without_path_is_not_an_instruction() {
    let input = "look:\n```rust\nfn main() {}\n```\nend";
    let (display, instructions) = collect(&CodeBlockExtractor::extract_all(input));
    assert_eq!(display, input);
    assert!(instructions.is_empty());
}

#[test]
fn multiple_blocks_come_out_in_document_order() {
    let input = concat!(
        "First:\n",
        "```python:a.py\nprint('a')\n```\n",
        "then\n",
        "```python:b.py\nprint('b')\n```\n",
        "done\n",
    );
    let (display, instructions) = collect(&CodeBlockExtractor::extract_all(input));
    assert_eq!(display, "First:\n\nthen\n\ndone\n");
    assert_eq!(
        instructions,
        vec![
            FileInstruction {
                path: "a.py".to_string(),
                language: "python".to_string(),
                content: "print('a')".to_string(),
            },
            FileInstruction {
                path: "b.py".to_string(),
                language: "python".to_string(),
                content: "print('b')".to_string(),
            },
        ]
    );
}

#[test]
fn events_interleave_text_and_instructions_in_order() {
    let events = CodeBlockExtractor::extract_all("intro\n```py:a.py\nx\n```\nafter");
    assert_eq!(
        events,
        vec![
            BlockEvent::Text("intro\n".to_string()),
            BlockEvent::File(FileInstruction {
                path: "a.py".to_string(),
                language: "py".to_string(),
                content: "x".to_string(),
            }),
            BlockEvent::Text("\nafter".to_string()),
        ]
    );
}

#[test]
fn display_and_blocks_reconstruct_the_response() {
    let inputs = [
        "no blocks, nothing to reassemble",
        "intro\n```py:a.py\nx = 1\n```\nafter",
        "A\n```rs:src/main.rs\nfn main() {}\n```\nB\n```toml:Cargo.toml\n[package]\n```\nC",
    ];
    for input in inputs {
        let mut rebuilt = String::new();
        for event in CodeBlockExtractor::extract_all(input) {
            match event {
                BlockEvent::Text(chunk) => rebuilt.push_str(&chunk),
                BlockEvent::File(instruction) => {
                    rebuilt.push_str("```");
                    rebuilt.push_str(&instruction.language);
                    rebuilt.push(':');
                    rebuilt.push_str(&instruction.path);
                    rebuilt.push('\n');
                    rebuilt.push_str(&instruction.content);
                    rebuilt.push_str("\n```");
                }
            }
        }
        assert_eq!(rebuilt, input);
    }
}

#[test]
fn flush_closes_an_unterminated_block() {
    let mut extractor = CodeBlockExtractor::new();
    let events = extractor.feed("```toml:Cargo.toml\n[package]\nname = \"demo\"\n");
    assert!(events.is_empty());
    let (display, instructions) = collect(&extractor.flush());
    assert_eq!(display, "");
    assert_eq!(
        instructions,
        vec![FileInstruction {
            path: "Cargo.toml".to_string(),
            language: "toml".to_string(),
            content: "[package]\nname = \"demo\"".to_string(),
        }]
    );
    assert!(extractor.is_idle());
}

#[test]
fn flush_drops_an_unterminated_block_with_blank_content() {
    let mut extractor = CodeBlockExtractor::new();
    extractor.feed("```py:a.py\n   \n");
    assert!(extractor.flush().is_empty());
}

#[test]
fn content_keeps_interior_whitespace_structure() {
    let input = "```python:app.py\n\ndef f():\n    return 1\n\n```";
    let (_, instructions) = collect(&CodeBlockExtractor::extract_all(input));
    assert_eq!(instructions[0].content, "def f():\n    return 1");
}

#[test]
fn blank_path_after_trim_is_still_captured() {
    // The applier rejects the empty path later; extraction is syntactic.
    let (display, instructions) = collect(&CodeBlockExtractor::extract_all("```py: \nx\n```"));
    assert_eq!(display, "");
    assert_eq!(instructions.len(), 1);
    assert_eq!(instructions[0].path, "");
    assert_eq!(instructions[0].content, "x");
}

#[test]
fn crlf_line_endings_are_trimmed_from_path_and_content() {
    let (_, instructions) =
        collect(&CodeBlockExtractor::extract_all("```python:app.py\r\nline\r\n```"));
    assert_eq!(
        instructions,
        vec![FileInstruction {
            path: "app.py".to_string(),
            language: "python".to_string(),
            content: "line".to_string(),
        }]
    );
}

#[test]
fn inner_fence_closes_the_block_early() {
    // Blocks are strictly sequential; a literal fence inside content ends it.
    let input = "```md:notes.md\nUse:\n```python\nprint()\n```\nend\n```\n";
    let (display, instructions) = collect(&CodeBlockExtractor::extract_all(input));
    assert_eq!(
        instructions,
        vec![FileInstruction {
            path: "notes.md".to_string(),
            language: "md".to_string(),
            content: "Use:".to_string(),
        }]
    );
    assert_eq!(display, "python\nprint()\n```\nend\n```\n");
}

#[test]
fn overlong_backtick_run_degrades_to_display_not_loss() {
    let mut extractor = CodeBlockExtractor::new();
    let input = format!("```{}", "a".repeat(120));
    let (head, instructions) = collect(&extractor.feed(&input));
    assert!(instructions.is_empty());
    assert_eq!(head, input[..input.len() - 16]);
    let (tail, _) = collect(&extractor.flush());
    assert_eq!(format!("{head}{tail}"), input);
}

#[test]
fn extractor_recovers_after_reset_mid_block() {
    let mut extractor = CodeBlockExtractor::new();
    extractor.feed("```python:doomed.py\nhalf a block");
    extractor.reset();

    let mut events = extractor.feed("```python:next.py\nok\n```");
    events.extend(extractor.flush());
    let (display, instructions) = collect(&events);
    assert_eq!(display, "");
    assert_eq!(instructions.len(), 1);
    assert_eq!(instructions[0].path, "next.py");
    assert_eq!(instructions[0].content, "ok");
}

#[test]
fn back_to_back_blocks_reuse_the_scanner_immediately() {
    let input = "```a:x\n1\n```\n```b:y\n2\n```";
    let (display, instructions) = collect(&CodeBlockExtractor::extract_all(input));
    assert_eq!(display, "\n");
    assert_eq!(instructions.len(), 2);
    assert_eq!(instructions[0].path, "x");
    assert_eq!(instructions[1].path, "y");
}
