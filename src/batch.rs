//! IRCv3 BATCH framing.
//!
//! A batch groups related lines between `BATCH +ref` and `BATCH -ref`
//! markers; member lines carry a `batch=ref` tag and batches may nest.
//! The framer buffers everything inside an open batch and surfaces a
//! completed unit only when the *outermost* batch closes. Un-batched lines
//! pass straight through, preserving arrival order.
//!
//! Members are kept as one ordered sequence of lines and nested batches,
//! so dispatch replays exactly the interleaving the server produced.
//!
//! # Reference
//! - IRCv3 batch: <https://ircv3.net/specs/extensions/batch>

use std::collections::HashMap;

use crate::message::Message;

/// One member of a batch, in arrival position.
#[derive(Clone, Debug, PartialEq)]
pub enum BatchMember {
    /// A member line.
    Line(Message),
    /// A nested batch, positioned where its open marker arrived.
    Nested(Batch),
}

/// A received batch: its reference tag, type, parameters, and members in
/// the order received.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    /// The reference tag, unique within the currently-open set.
    pub reference: String,
    /// The batch type (e.g. `netsplit`, `chathistory`).
    pub kind: String,
    /// Additional parameters after the type.
    pub params: Vec<String>,
    /// Member lines and nested batches, interleaved as they arrived.
    pub members: Vec<BatchMember>,
    /// Whether this batch has seen its close marker. A closed nested
    /// batch's reference is no longer addressable, freeing it for reuse.
    pub closed: bool,
}

impl Batch {
    fn new(reference: String, kind: String, params: Vec<String>) -> Self {
        Batch {
            reference,
            kind,
            params,
            members: Vec::new(),
            closed: false,
        }
    }

    /// The direct member lines, in arrival order.
    pub fn lines(&self) -> impl Iterator<Item = &Message> {
        self.members.iter().filter_map(|member| match member {
            BatchMember::Line(line) => Some(line),
            BatchMember::Nested(_) => None,
        })
    }

    /// The directly nested batches, in arrival order.
    pub fn nested(&self) -> impl Iterator<Item = &Batch> {
        self.members.iter().filter_map(|member| match member {
            BatchMember::Nested(batch) => Some(batch),
            BatchMember::Line(_) => None,
        })
    }

    /// Look up a directly nested batch by reference tag.
    pub fn find_nested(&self, reference: &str) -> Option<&Batch> {
        self.nested().find(|batch| batch.reference == reference)
    }

    /// Total number of member lines, including nested batches.
    pub fn line_count(&self) -> usize {
        self.members
            .iter()
            .map(|member| match member {
                BatchMember::Line(_) => 1,
                BatchMember::Nested(batch) => batch.line_count(),
            })
            .sum()
    }
}

/// A unit surfaced by the framer.
#[derive(Clone, Debug, PartialEq)]
pub enum FramedUnit {
    /// An un-batched line.
    Line(Message),
    /// A fully closed root batch.
    Batch(Batch),
}

/// Outcome of feeding one message to the framer.
#[derive(Clone, Debug, PartialEq)]
pub enum FramerOutcome {
    /// The message was captured inside an open batch.
    Buffered,
    /// A unit completed and should be dispatched now.
    Surfaced(FramedUnit),
    /// A `BATCH -ref` arrived for a reference that is not open.
    UnmatchedClose(String),
}

/// Line-oriented batch reassembly.
#[derive(Debug, Default)]
pub struct BatchFramer {
    open: HashMap<String, Batch>,
}

impl BatchFramer {
    /// Create an empty framer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while any batch is open.
    pub fn has_open_batches(&self) -> bool {
        !self.open.is_empty()
    }

    /// Feed one parsed message.
    pub fn accept(&mut self, msg: Message) -> FramerOutcome {
        match msg.batch_tag() {
            None => self.accept_unbatched(msg),
            Some(reference) => {
                let reference = reference.to_owned();
                self.accept_batched(msg, &reference)
            }
        }
    }

    fn accept_unbatched(&mut self, msg: Message) -> FramerOutcome {
        if msg.verb != "BATCH" {
            return FramerOutcome::Surfaced(FramedUnit::Line(msg));
        }

        let Some(marker) = msg.arg(0) else {
            // BATCH with no argument is nonsense; let the dispatcher see it
            return FramerOutcome::Surfaced(FramedUnit::Line(msg));
        };

        if let Some(reference) = marker.strip_prefix('+') {
            let kind = msg.arg(1).unwrap_or("").to_owned();
            let params = msg.args.iter().skip(2).cloned().collect();
            self.open
                .insert(reference.to_owned(), Batch::new(reference.to_owned(), kind, params));
            FramerOutcome::Buffered
        } else if let Some(reference) = marker.strip_prefix('-') {
            match self.open.remove(reference) {
                Some(batch) => FramerOutcome::Surfaced(FramedUnit::Batch(batch)),
                None => FramerOutcome::UnmatchedClose(reference.to_owned()),
            }
        } else {
            FramerOutcome::Surfaced(FramedUnit::Line(msg))
        }
    }

    fn accept_batched(&mut self, msg: Message, reference: &str) -> FramerOutcome {
        let Some((root, path)) = find_path(&self.open, reference) else {
            // Unknown reference: surface immediately rather than drop
            return FramerOutcome::Surfaced(FramedUnit::Line(msg));
        };
        let parent = batch_at_path_mut(&mut self.open, &root, &path);

        if msg.verb == "BATCH" {
            if let Some(marker) = msg.arg(0) {
                if let Some(nested_ref) = marker.strip_prefix('+') {
                    let kind = msg.arg(1).unwrap_or("").to_owned();
                    let params = msg.args.iter().skip(2).cloned().collect();
                    parent.members.push(BatchMember::Nested(Batch::new(
                        nested_ref.to_owned(),
                        kind,
                        params,
                    )));
                    return FramerOutcome::Buffered;
                }
                if let Some(closed_ref) = marker.strip_prefix('-') {
                    // Complete within the parent; surfaced when the root closes
                    if parent.reference == closed_ref {
                        parent.closed = true;
                        return FramerOutcome::Buffered;
                    }
                    for member in parent.members.iter_mut() {
                        if let BatchMember::Nested(nested) = member {
                            if nested.reference == closed_ref && !nested.closed {
                                nested.closed = true;
                                return FramerOutcome::Buffered;
                            }
                        }
                    }
                    return FramerOutcome::UnmatchedClose(closed_ref.to_owned());
                }
            }
        }

        parent.members.push(BatchMember::Line(msg));
        FramerOutcome::Buffered
    }
}

/// Locate a batch by reference anywhere in the open forest. Returns the
/// root key plus the member-index path down to the match. Depth is small
/// in practice, so the recursive walk is fine.
fn find_path(open: &HashMap<String, Batch>, reference: &str) -> Option<(String, Vec<usize>)> {
    for (key, batch) in open {
        if key == reference {
            return Some((key.clone(), Vec::new()));
        }
        if let Some(path) = find_member_path(batch, reference) {
            return Some((key.clone(), path));
        }
    }
    None
}

fn find_member_path(batch: &Batch, reference: &str) -> Option<Vec<usize>> {
    for (index, member) in batch.members.iter().enumerate() {
        let BatchMember::Nested(nested) = member else {
            continue;
        };
        // A closed sub-batch and its contents are no longer addressable
        if nested.closed {
            continue;
        }
        if nested.reference == reference {
            return Some(vec![index]);
        }
        if let Some(mut path) = find_member_path(nested, reference) {
            path.insert(0, index);
            return Some(path);
        }
    }
    None
}

fn batch_at_path_mut<'a>(
    open: &'a mut HashMap<String, Batch>,
    root: &str,
    path: &[usize],
) -> &'a mut Batch {
    let mut current = open
        .get_mut(root)
        .expect("root produced by find_path is valid");
    for &index in path {
        let BatchMember::Nested(nested) = &mut current.members[index] else {
            unreachable!("path produced by find_path points at nested members");
        };
        current = nested;
    }
    current
}
