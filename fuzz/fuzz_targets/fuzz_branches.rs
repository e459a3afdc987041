#![no_main]
use std::io::Cursor;

use arbitrary::Arbitrary;
use branchio::{BranchOptions, TextBranch, TextOptions};
use libfuzzer_sys::fuzz_target;

static ENCODINGS: &[&str] = &[
    "UTF-8",
    "UTF-16BE",
    "UTF-16LE",
    "UTF-32BE",
    "UTF-32LE",
    "UTF-7",
    "ISO-8859-1",
    "US-ASCII",
];

#[derive(Debug, Arbitrary)]
enum Op {
    Read { branch: u8, len: u8 },
    Unread { branch: u8, len: u8 },
    Fork { branch: u8 },
    Close { branch: u8 },
    CloseOthers { branch: u8 },
}

#[derive(Debug, Arbitrary)]
struct Input {
    bytes: Vec<u8>,
    chunk_size: u8,
    encoding: Option<u8>,
    overwrite_detected: bool,
    ops: Vec<Op>,
}

/// A branch and the characters it has consumed net of pushback, counted from
/// the start of the decoded text.
struct Tracked {
    branch: TextBranch,
    history: Vec<char>,
}

fn run(input: Input) {
    let options = TextOptions {
        branch: BranchOptions {
            chunk_size: usize::from(input.chunk_size),
        },
        encoding: input
            .encoding
            .map(|i| ENCODINGS[usize::from(i) % ENCODINGS.len()].to_owned()),
        overwrite_detected: input.overwrite_detected,
    };
    let Ok(root) = TextBranch::from_bytes(Cursor::new(input.bytes), options) else {
        return;
    };

    // Every branch must agree with a full read of the same store.
    let Ok(mut reference) = root.fork() else {
        return;
    };
    let mut expected = String::new();
    if reference.read_to_string(&mut expected).is_err() {
        return;
    }
    let expected: Vec<char> = expected.chars().collect();
    reference.close();

    let mut live = vec![Tracked {
        branch: root,
        history: Vec::new(),
    }];
    for op in input.ops {
        if live.is_empty() {
            break;
        }
        let count = live.len();
        let pick = |b: u8| usize::from(b) % count;
        match op {
            Op::Read { branch, len } => {
                let tracked = &mut live[pick(branch)];
                let mut buf = vec!['\0'; usize::from(len)];
                let Ok(n) = tracked.branch.read(&mut buf) else {
                    return;
                };
                tracked.history.extend_from_slice(&buf[..n]);
                assert_eq!(tracked.history[..], expected[..tracked.history.len()]);
            }
            Op::Unread { branch, len } => {
                let tracked = &mut live[pick(branch)];
                let keep = tracked.history.len().saturating_sub(usize::from(len));
                let before = tracked.branch.text_position();
                let back = tracked.history.split_off(keep);
                tracked.branch.unread_all(&back);
                let mut again = vec!['\0'; back.len()];
                let mut got = 0;
                while got < again.len() {
                    match tracked.branch.read(&mut again[got..]) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => got += n,
                    }
                }
                assert_eq!(again[..got], back[..]);
                assert_eq!(tracked.branch.text_position(), before);
                tracked.history.extend_from_slice(&back);
            }
            Op::Fork { branch } => {
                let parent = &live[pick(branch)];
                let child = parent.branch.fork().expect("live branches are open");
                let history = parent.history.clone();
                live.push(Tracked {
                    branch: child,
                    history,
                });
            }
            Op::Close { branch } => {
                let closed = live.swap_remove(pick(branch));
                closed.branch.close();
                assert!(closed.branch.is_closed());
            }
            Op::CloseOthers { branch } => {
                let survivor = live.swap_remove(pick(branch));
                assert!(survivor.branch.close_others());
                assert!(live.iter().all(|t| t.branch.is_closed()));
                assert_eq!(survivor.branch.branches(), vec![survivor.branch.id()]);
                live = vec![survivor];
            }
        }
    }
}

fuzz_target!(|input: Input| run(input));
