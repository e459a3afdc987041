#![allow(missing_docs)]

use std::{fmt::Write as _, thread};

use branchio::{BranchError, BranchOptions, TextBranch, TextPosition, TextSource};

fn trace(branch: &mut TextBranch) -> String {
    let mut out = String::new();
    loop {
        let TextPosition { line, column } = branch.text_position();
        let Some(ch) = branch.read_unit().unwrap() else {
            writeln!(out, "{line}:{column} <eof>").unwrap();
            return out;
        };
        writeln!(out, "{line}:{column} {ch:?}").unwrap();
    }
}

#[test]
fn line_and_column_of_each_char() {
    let mut text = TextBranch::new(TextSource::new("a\nb"));
    let mut seen = Vec::new();
    while let (at, Some(ch)) = (text.text_position(), text.read_unit().unwrap()) {
        seen.push((at.line, at.column, ch));
    }
    assert_eq!(seen, [(1, 1, 'a'), (1, 2, '\n'), (2, 1, 'b')]);

    text.unread('b');
    assert_eq!((text.line(), text.column()), (2, 1));
    assert_eq!(text.read_unit().unwrap(), Some('b'));
}

#[test]
fn position_trace_snapshot() {
    let mut text = TextBranch::with_options(
        TextSource::new("fn x\n\tgo\r\n\nend"),
        BranchOptions { chunk_size: 3 },
    );
    insta::assert_snapshot!(trace(&mut text), @r#"
    1:1 'f'
    1:2 'n'
    1:3 ' '
    1:4 'x'
    1:5 '\n'
    2:1 '\t'
    2:2 'g'
    2:3 'o'
    2:4 '\r'
    2:5 '\n'
    3:1 '\n'
    4:1 'e'
    4:2 'n'
    4:3 'd'
    4:4 <eof>
    "#);
}

#[test]
fn unread_of_a_different_char_still_rolls_back() {
    let mut text = TextBranch::new(TextSource::new("ab"));
    assert_eq!(text.read_unit().unwrap(), Some('a'));
    text.unread('z');
    assert_eq!(text.column(), 1);
    let mut s = String::new();
    text.read_to_string(&mut s).unwrap();
    assert_eq!(s, "zb");
}

#[test]
fn branches_keep_their_own_positions_across_threads() {
    let source: String = (0..200).map(|i| format!("line {i}\n")).collect();
    let root = TextBranch::with_options(TextSource::new(&source), BranchOptions { chunk_size: 17 });
    let branches = root.branch(4).unwrap();

    thread::scope(|scope| {
        for (skip, mut branch) in branches.into_iter().enumerate() {
            let source = &source;
            scope.spawn(move || {
                for _ in 0..skip * 10 {
                    branch.read_unit().unwrap();
                }
                let mut rest = String::new();
                branch.read_to_string(&mut rest).unwrap();
                assert_eq!(rest, source[skip * 10..]);
                assert_eq!(branch.text_position(), TextPosition { line: 201, column: 1 });
            });
        }
    });
    drop(root);
}

#[test]
fn encoding_is_resolved_once_per_store() {
    let root = TextBranch::new(TextSource::new("é").with_encoding("ISO-8859-1"));
    let child = root.fork().unwrap();
    assert_eq!(root.encoding(), Some("ISO-8859-1"));
    assert_eq!(child.encoding(), Some("ISO-8859-1"));
    assert_eq!(TextBranch::new(TextSource::new("")).encoding(), None);
}

#[test_log::test]
fn close_others_on_text_branches() {
    let root = TextBranch::new(TextSource::new("shared"));
    let mut children = root.branch(2).unwrap();
    assert!(children[0].close_others());
    assert!(root.is_closed());
    assert!(matches!(root.fork(), Err(BranchError::Closed)));
    assert!(!children[1].close_others());

    let mut s = String::new();
    children[1].read_to_string(&mut s).unwrap();
    assert!(s.is_empty());
    children[0].read_to_string(&mut s).unwrap();
    assert_eq!(s, "shared");
    assert_eq!(children[0].branches(), vec![children[0].id()]);
}
