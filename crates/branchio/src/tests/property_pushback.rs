use quickcheck_macros::quickcheck;

use crate::{BranchOptions, TextBranch, TextPosition, TextSource};

const ALPHABET: [char; 6] = ['a', 'b', '\n', '\r', 'é', ' '];

fn read_chars(text: &mut TextBranch, count: usize) -> Vec<char> {
    let mut out = Vec::new();
    let mut buf = ['\0'; 3];
    while out.len() < count {
        let want = (count - out.len()).min(buf.len());
        let n = text.read(&mut buf[..want]).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    out
}

/// Property: unreading a slice just read and reading it again yields the same
/// characters and the same line and column at both ends.
#[quickcheck]
#[allow(clippy::needless_pass_by_value)]
fn pushback_round_trip(symbols: Vec<u8>, skip: usize, take: usize, chunk_size: u8) -> bool {
    let text: String = symbols
        .iter()
        .map(|&b| ALPHABET[usize::from(b) % ALPHABET.len()])
        .collect();
    let len = text.chars().count();
    let mut branch = TextBranch::with_options(
        TextSource::new(&text),
        BranchOptions {
            chunk_size: usize::from(chunk_size % 8) + 1,
        },
    );

    let skip = skip % (len + 1);
    let take = take % (len - skip + 1);
    read_chars(&mut branch, skip);
    let before: TextPosition = branch.text_position();
    let slice = read_chars(&mut branch, take);
    let after = branch.text_position();

    branch.unread_all(&slice);
    let restored = branch.text_position();
    let again = read_chars(&mut branch, take);

    slice.len() == take && restored == before && again == slice && branch.text_position() == after
}
