//! Grounded answer generation with per-chunk source attribution.

use std::collections::HashSet;
use std::sync::Arc;

use super::chunker::TextSplitter;
use super::collection::VectorMemory;
use super::collector::{citation_fields, SearchResult};
use super::store::ScoredPoint;
use crate::core::config::settings::SynthesisSettings;
use crate::core::errors::ApiError;
use crate::llm::{Embedder, Generator};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationEntry {
    pub title: String,
    pub link: String,
}

pub struct AnswerSynthesizer {
    generator: Arc<dyn Generator>,
    embedder: Arc<dyn Embedder>,
    splitter: Arc<dyn TextSplitter>,
    memory: Arc<VectorMemory>,
    collection: String,
    citations_per_chunk: usize,
    labels: SynthesisSettings,
}

impl AnswerSynthesizer {
    pub fn new(
        generator: Arc<dyn Generator>,
        embedder: Arc<dyn Embedder>,
        splitter: Arc<dyn TextSplitter>,
        memory: Arc<VectorMemory>,
        collection: impl Into<String>,
        citations_per_chunk: usize,
        labels: SynthesisSettings,
    ) -> Self {
        Self {
            generator,
            embedder,
            splitter,
            memory,
            collection: collection.into(),
            citations_per_chunk,
            labels,
        }
    }

    /// Generates an answer from `results`, then appends to every answer
    /// chunk the sources its nearest stored chunks came from, and finally a
    /// references block listing all results.
    pub async fn synthesize(&self, query: &str, results: &[SearchResult]) -> Result<String, ApiError> {
        let collection = self.memory.get(&self.collection).await.map_err(|_| {
            ApiError::Configuration(format!(
                "vector collection '{}' does not exist",
                self.collection
            ))
        })?;

        let prompt = build_prompt(query, results);
        let answer = self.generator.generate(&prompt).await?;

        let overlapping = self.splitter.split(&answer, None);
        let plain = self.splitter.split(&answer, Some(0));
        if overlapping.len() != plain.len() {
            tracing::debug!(
                "Answer chunk counts differ ({} with overlap, {} without); pairing the first {}",
                overlapping.len(),
                plain.len(),
                overlapping.len().min(plain.len())
            );
        }

        let mut output = String::new();
        for (query_chunk, text_chunk) in overlapping.iter().zip(plain.iter()) {
            let embedding = self.embedder.embed_query(&query_chunk.text).await?;
            let neighbors = collection.query(&embedding, self.citations_per_chunk).await?;
            let citations = dedupe_citations(&neighbors);

            output.push_str(&text_chunk.text);
            output.push_str("<br>");
            if !citations.is_empty() {
                let lines: Vec<String> = citations
                    .iter()
                    .map(|c| {
                        format!(
                            "{}: <a href=\"{}\" target=\"_blank\">{}</a>",
                            self.labels.citation_label,
                            escape_html(&c.link),
                            escape_html(&c.title)
                        )
                    })
                    .collect();
                output.push_str(&lines.join("\n"));
                output.push('\n');
            }
        }

        output.push_str(&render_references(results, &self.labels.references_label));
        Ok(output)
    }
}

/// Prompt asking for an answer drawn only from the given results.
pub fn build_prompt(query: &str, results: &[SearchResult]) -> String {
    let mut material = String::new();
    for result in results {
        material.push_str(&format!("Article Title: {}\n", result.title));
        material.push_str(&format!("Content: {}\n", result.content));
    }

    format!(
        "Answer the user's QUESTION clearly, using only the information contained in the \
         search RESULTS below. If the results do not contain the answer, say so.\n\n\
         QUESTION:\n{}\n\nRESULTS:\n{}",
        query, material
    )
}

/// `{title, link}` of each neighbour, first occurrence of a link wins.
/// Neighbours without search metadata are ignored.
pub fn dedupe_citations(neighbors: &[ScoredPoint]) -> Vec<CitationEntry> {
    let mut seen = HashSet::new();
    neighbors
        .iter()
        .filter_map(|n| citation_fields(&n.point.metadata))
        .filter(|(_, link)| seen.insert(link.clone()))
        .map(|(title, link)| CitationEntry { title, link })
        .collect()
}

fn render_references(results: &[SearchResult], label: &str) -> String {
    let lines: Vec<String> = results
        .iter()
        .map(|r| {
            format!(
                "<a href='{}' target='_blank'>{}</a>",
                escape_html(&r.url),
                escape_html(&r.title)
            )
        })
        .collect();
    format!("<br>{}:<br>{}", label, lines.join("\n"))
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::rag::memory::InMemoryBackend;
    use crate::rag::store::{CollectionBackend, CollectionInfo, Metadata, Point};
    use crate::rag::testing::{FixedSplitter, HashEmbedder, ScriptedGenerator};

    fn result(url: &str, title: &str, position: usize) -> SearchResult {
        SearchResult {
            url: url.to_string(),
            title: title.to_string(),
            description: String::new(),
            content: format!("content of {}", title),
            position,
        }
    }

    fn scored(title: &str, link: &str) -> ScoredPoint {
        let mut metadata = Metadata::new();
        metadata.insert("search".to_string(), json!({ "title": title, "link": link }));
        ScoredPoint {
            point: Point {
                id: link.to_string(),
                text: String::new(),
                embedding: Vec::new(),
                metadata,
            },
            score: 1.0,
        }
    }

    fn labels() -> SynthesisSettings {
        SynthesisSettings {
            citation_label: "Citation".to_string(),
            references_label: "References".to_string(),
        }
    }

    async fn memory_with(points: &[(&str, &str, &str)]) -> Arc<VectorMemory> {
        let memory = Arc::new(VectorMemory::new());
        let coll = InMemoryBackend
            .create(CollectionInfo {
                name: "search".to_string(),
                embedder_name: "hash-embedder".to_string(),
                dimension: 32,
            })
            .await
            .unwrap();
        let embedder = HashEmbedder::new(32);
        for (text, title, link) in points {
            let mut metadata = Metadata::new();
            metadata.insert("search".to_string(), json!({ "title": title, "link": link }));
            let vector = embedder.embed_query(text).await.unwrap();
            coll.add_point(text, vector, metadata).await.unwrap();
        }
        memory.register(coll).await;
        memory
    }

    fn synthesizer(
        answer: &str,
        splitter: FixedSplitter,
        memory: Arc<VectorMemory>,
        k: usize,
    ) -> AnswerSynthesizer {
        AnswerSynthesizer::new(
            Arc::new(ScriptedGenerator::answering(answer)),
            Arc::new(HashEmbedder::new(32)),
            Arc::new(splitter),
            memory,
            "search",
            k,
            labels(),
        )
    }

    #[test]
    fn prompt_embeds_query_and_every_result() {
        let prompt = build_prompt(
            "capital of France",
            &[result("https://a", "A", 1), result("https://b", "B", 2)],
        );
        assert!(prompt.contains("QUESTION:\ncapital of France"));
        assert!(prompt.contains("Article Title: A\nContent: content of A\n"));
        assert!(prompt.contains("Article Title: B\nContent: content of B\n"));
    }

    #[test]
    fn citations_dedupe_by_link_in_first_seen_order() {
        let neighbors = vec![
            scored("B", "https://b"),
            scored("A", "https://a"),
            scored("B (mirror title)", "https://b"),
            scored("Same", "https://c"),
            scored("Same", "https://d"),
        ];

        let citations = dedupe_citations(&neighbors);
        let links: Vec<&str> = citations.iter().map(|c| c.link.as_str()).collect();
        assert_eq!(links, vec!["https://b", "https://a", "https://c", "https://d"]);
        assert_eq!(citations[0].title, "B");
    }

    #[tokio::test]
    async fn output_interleaves_chunks_citations_and_references() {
        let memory = memory_with(&[("paris capital france", "Paris", "https://paris")]).await;
        let splitter = FixedSplitter::new(&["Paris is the capital."], &["Paris is the capital."]);
        let s = synthesizer("Paris is the capital.", splitter, memory, 3);

        let results = vec![
            result("https://paris", "Paris", 1),
            result("https://uncited", "Never cited", 2),
        ];
        let out = s.synthesize("capital of France", &results).await.unwrap();

        assert_eq!(
            out,
            "Paris is the capital.<br>\
             Citation: <a href=\"https://paris\" target=\"_blank\">Paris</a>\n\
             <br>References:<br>\
             <a href='https://paris' target='_blank'>Paris</a>\n\
             <a href='https://uncited' target='_blank'>Never cited</a>"
        );
    }

    #[tokio::test]
    async fn mismatched_chunkings_are_paired_up_to_the_shorter() {
        let memory = memory_with(&[("alpha", "A", "https://a")]).await;
        let splitter = FixedSplitter::new(&["o1", "o2", "o3"], &["p1", "p2", "p3", "p4"]);
        let s = synthesizer("whatever", splitter, memory, 1);

        let out = s.synthesize("q", &[result("https://a", "A", 1)]).await.unwrap();
        assert!(out.contains("p1<br>"));
        assert!(out.contains("p3<br>"));
        assert!(!out.contains("p4"));
        assert!(!out.contains("o1"));
        assert_eq!(out.matches("Citation:").count(), 3);
    }

    #[tokio::test]
    async fn same_title_different_links_are_both_cited() {
        let memory = memory_with(&[
            ("eiffel tower paris", "Paris guide", "https://one"),
            ("eiffel tower paris", "Paris guide", "https://two"),
        ])
        .await;
        let splitter = FixedSplitter::new(&["eiffel tower paris"], &["The Eiffel Tower is in Paris."]);
        let s = synthesizer("x", splitter, memory, 3);

        let out = s.synthesize("q", &[]).await.unwrap();
        assert!(out.contains("<a href=\"https://one\" target=\"_blank\">Paris guide</a>"));
        assert!(out.contains("<a href=\"https://two\" target=\"_blank\">Paris guide</a>"));
    }

    #[tokio::test]
    async fn generator_failure_fails_the_synthesis() {
        let memory = memory_with(&[]).await;
        let s = AnswerSynthesizer::new(
            Arc::new(ScriptedGenerator::failing("quota exceeded")),
            Arc::new(HashEmbedder::new(32)),
            Arc::new(FixedSplitter::new(&["a"], &["a"])),
            memory,
            "search",
            3,
            labels(),
        );
        assert!(matches!(s.synthesize("q", &[]).await, Err(ApiError::Upstream(_))));
    }

    #[tokio::test]
    async fn missing_collection_is_a_configuration_error() {
        let s = synthesizer("a", FixedSplitter::new(&["a"], &["a"]), Arc::new(VectorMemory::new()), 3);
        assert!(matches!(s.synthesize("q", &[]).await, Err(ApiError::Configuration(_))));
    }

    #[test]
    fn titles_are_escaped() {
        let refs = render_references(&[result("https://a?x=1&y=2", "<b>A</b>", 1)], "References");
        assert_eq!(
            refs,
            "<br>References:<br><a href='https://a?x=1&amp;y=2' target='_blank'>&lt;b&gt;A&lt;/b&gt;</a>"
        );
    }
}
