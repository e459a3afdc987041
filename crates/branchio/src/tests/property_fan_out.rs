use std::io::Cursor;

use quickcheck::QuickCheck;

use super::quickcheck_tests;
use crate::{BranchOptions, ByteBranch};

struct Tracked {
    branch: ByteBranch,
    start: usize,
    out: Vec<u8>,
}

impl Tracked {
    fn read(&mut self, len: usize) {
        let mut buf = vec![0; len];
        let n = self.branch.read(&mut buf[..]).unwrap();
        self.out.extend_from_slice(&buf[..n]);
    }

    fn finish(mut self, data: &[u8]) -> bool {
        loop {
            let before = self.out.len();
            self.read(5);
            if self.out.len() == before {
                break;
            }
        }
        self.out == data[self.start..]
    }
}

/// Property: under any interleaving of reads, forks and closes, every branch
/// yields exactly the source's bytes from the position it was forked at.
#[test]
fn fan_out_fidelity_quickcheck() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(data: Vec<u8>, chunk_size: u8, schedule: Vec<(u8, u8)>) -> bool {
        let root = ByteBranch::with_options(
            Cursor::new(data.clone()),
            BranchOptions {
                chunk_size: usize::from(chunk_size % 16) + 1,
            },
        );
        let mut live = vec![Tracked {
            branch: root,
            start: 0,
            out: Vec::new(),
        }];

        for (op, arg) in schedule {
            if live.is_empty() {
                break;
            }
            let pick = usize::from(arg) % live.len();
            match op % 4 {
                0 | 1 => live[pick].read(usize::from(arg % 7) + 1),
                2 => {
                    let parent = &live[pick];
                    let start = parent.start + parent.out.len();
                    let branch = parent.branch.fork().unwrap();
                    live.push(Tracked {
                        branch,
                        start,
                        out: Vec::new(),
                    });
                }
                _ => {
                    let closed = live.swap_remove(pick);
                    closed.branch.close();
                    let seen = &data[closed.start..][..closed.out.len()];
                    if !closed.branch.is_closed() || closed.out != seen {
                        return false;
                    }
                }
            }
        }

        let registered = live.first().map(|t| t.branch.branches()).unwrap_or_default();
        let mut ids = live.iter().map(|t| t.branch.id()).collect::<Vec<_>>();
        ids.sort_unstable();
        ids == registered && live.into_iter().all(|t| t.finish(&data))
    }

    QuickCheck::new()
        .tests(quickcheck_tests())
        .quickcheck(prop as fn(Vec<u8>, u8, Vec<(u8, u8)>) -> bool);
}
