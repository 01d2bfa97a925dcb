
use tracing::debug;

use crate::openai::{ChatMessage, OpenAiClient};
use crate::qdrant::{QdrantClient, ScoredPoint};
use crate::{ChatError, Result};

/// A retrieved document that supported an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReference {
    /// Origin identifier from the document's payload; may be empty.
    pub origin: String,
    /// The document's text content.
    pub snippet: String,
}

/// One question/answer exchange with its supporting documents.
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub question: String,
    pub answer: String,
    pub sources: Vec<SourceReference>,
}

/// Ordered history of turns for one conversation. Append-only: turns are
/// never reordered or mutated after creation.
#[derive(Debug, Clone, Default)]
pub struct Session {
    turns: Vec<Turn>,
}

impl Session {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    #[inline]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Processes one user question into one turn: retrieval, answer
/// synthesis, and source attribution. Holds no conversation state of its
/// own; the caller owns the session and appends successful turns.
pub struct SessionManager {
    openai: OpenAiClient,
    qdrant: QdrantClient,
    collection: String,
    top_k: usize,
}

impl SessionManager {
    #[inline]
    pub fn new(
        openai: OpenAiClient,
        qdrant: QdrantClient,
        collection: impl Into<String>,
        top_k: usize,
    ) -> Self {
        Self {
            openai,
            qdrant,
            collection: collection.into(),
            top_k,
        }
    }

    /// Process one question against the session so far.
    ///
    /// The session is borrowed immutably: the prior turns become the
    /// conversational history for this turn, and the turn under
    /// construction can never see its own answer. Any failure returns an
    /// error without producing a partial turn; the caller leaves the
    /// session untouched.
    #[inline]
    pub fn process_turn(&self, question: &str, session: &Session) -> Result<Turn> {
        if question.trim().is_empty() {
            return Err(ChatError::Generation(
                "Question must not be empty".to_string(),
            ));
        }

        debug!("Retrieving context for question ({} chars)", question.len());
        let embedding = self.openai.embed(question)?;
        let hits = self.qdrant.search(&self.collection, embedding, self.top_k)?;

        if hits.is_empty() {
            return Err(ChatError::VectorStore(format!(
                "Similarity search over '{}' returned no documents",
                self.collection
            )));
        }

        debug!("Generating answer from {} retrieved documents", hits.len());
        let messages = build_messages(question, &hits, session);
        let answer = self.openai.chat(&messages)?;

        let sources = hits.into_iter().map(source_reference).collect();

        Ok(Turn {
            question: question.to_string(),
            answer,
            sources,
        })
    }
}

/// Assemble the generation request: retrieved documents as context in the
/// system message, prior turns as chronological user/assistant pairs,
/// then the literal question.
pub(crate) fn build_messages(
    question: &str,
    hits: &[ScoredPoint],
    session: &Session,
) -> Vec<ChatMessage> {
    let context = hits
        .iter()
        .filter_map(|hit| hit.payload.as_ref())
        .map(|payload| payload.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut messages = Vec::with_capacity(session.len() * 2 + 2);
    messages.push(ChatMessage::system(format!(
        "You are an assistant answering questions about KIMIA Assess. \
         Answer using only the following context. If the context does not \
         contain the answer, say that you don't know.\n\nContext:\n{context}"
    )));

    for turn in session.turns() {
        messages.push(ChatMessage::user(turn.question.clone()));
        messages.push(ChatMessage::assistant(turn.answer.clone()));
    }

    messages.push(ChatMessage::user(question));
    messages
}

fn source_reference(hit: ScoredPoint) -> SourceReference {
    hit.payload.map_or_else(
        || SourceReference {
            origin: String::new(),
            snippet: String::new(),
        },
        |payload| SourceReference {
            origin: payload.origin(),
            snippet: payload.text,
        },
    )
}
