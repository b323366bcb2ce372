//! Property tests for retrieval, reranking, and prompt assembly.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{Map, json};
use shantilly_rag::testing::HashEmbeddingProvider;
use shantilly_rag::{
    ConversationTurn, DocumentChunk, EmbeddingClient, InMemoryVectorStore, KeywordBoostScorer,
    Metadata, MetadataValue, PassthroughRewriter, PromptTemplate, QueryRewriter, RankedSet,
    RelevanceScorer, RerankConfig, Reranker, Retriever, VectorStore,
};

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map("non-zero embedding", |mut v| {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < 1e-8 {
            return None;
        }
        for val in &mut v {
            *val /= norm;
        }
        Some(v)
    })
}

/// Generate a retrieved chunk with an arbitrary score.
fn arb_chunk() -> impl Strategy<Value = DocumentChunk> {
    ("[a-z]{1,4}", "[a-z ]{0,30}", -1.0f32..1.0f32, proptest::option::of("[a-z/]{3,12}")).prop_map(
        |(id, text, score, source)| {
            let mut metadata = Metadata::new();
            if let Some(source) = source {
                metadata.insert("source".into(), MetadataValue::String(source));
            }
            DocumentChunk { id, text, metadata, score, rerank_score: None }
        },
    )
}

fn arb_rerank_config() -> impl Strategy<Value = RerankConfig> {
    (any::<bool>(), proptest::option::of(1usize..10))
        .prop_map(|(enabled, top_k)| RerankConfig { enabled, top_k })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
}

/// **Property 1: Retrieval is bounded and ordered**
/// *For any* set of stored points and query vector, retrieving with `top_k`
/// SHALL return at most `min(top_k, stored)` chunks, never padded, in
/// non-increasing score order.
mod prop_retrieval_bounded_and_ordered {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn never_padded_and_descending(
            vectors in proptest::collection::vec(arb_normalized_embedding(DIM), 0..20),
            query in "[a-z]{1,12}",
            top_k in 1usize..25,
        ) {
            let (chunks, stored) = runtime().block_on(async {
                let store = InMemoryVectorStore::new();
                store.create_collection("test", DIM).await;
                for (i, vector) in vectors.iter().enumerate() {
                    let mut payload = Map::new();
                    payload.insert("text".into(), json!(format!("passage {i}")));
                    store.insert("test", i.to_string(), vector.clone(), payload).await.unwrap();
                }
                let embedder = EmbeddingClient::new(
                    Arc::new(HashEmbeddingProvider::new(DIM)),
                    DIM,
                    std::time::Duration::from_secs(1),
                );
                let store: Arc<dyn VectorStore> = Arc::new(store);
                let retriever = Retriever::new(embedder, store, "test");
                (retriever.retrieve(&query, top_k).await.unwrap(), vectors.len())
            });

            prop_assert_eq!(chunks.len(), top_k.min(stored));
            for pair in chunks.windows(2) {
                prop_assert!(
                    pair[0].score >= pair[1].score,
                    "not descending: {} < {}", pair[0].score, pair[1].score
                );
            }
        }
    }
}

/// **Property 2: Disabled reranking is pass-through**
/// *For any* candidate list without duplicate ids, a disabled reranker SHALL
/// return the candidates in the same order with the same length and scores.
mod prop_rerank_disabled_pass_through {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn order_and_length_preserved(
            docs in proptest::collection::vec(arb_chunk(), 0..15),
            top_k in proptest::option::of(1usize..5),
        ) {
            let mut seen = HashSet::new();
            let docs: Vec<DocumentChunk> =
                docs.into_iter().filter(|d| seen.insert(d.id.clone())).collect();

            let reranker = Reranker::new(RerankConfig { enabled: false, top_k });
            let ranked = runtime().block_on(reranker.rerank("q", &docs)).unwrap();
            prop_assert_eq!(ranked.into_inner(), docs);
        }
    }
}

/// **Property 3: Reranking is idempotent and bounded**
/// *For any* candidate list, configuration, and built-in scorer, reranking
/// the output of a rerank SHALL return it unchanged, and the output SHALL
/// never be longer than `top_k` nor contain an id twice.
mod prop_rerank_idempotent {
    use super::*;

    /// `None` selects the default retrieval-score scorer.
    fn arb_keyword_boost() -> impl Strategy<Value = Option<f32>> {
        proptest::option::of(0.0f32..1.0f32)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn rerank_twice_equals_rerank_once(
            docs in proptest::collection::vec(arb_chunk(), 0..15),
            config in arb_rerank_config(),
            boost in arb_keyword_boost(),
            query in "[a-z ]{0,20}",
        ) {
            let reranker = match boost {
                Some(boost) => Reranker::new(config)
                    .with_scorer(Arc::new(KeywordBoostScorer::new(boost)) as Arc<dyn RelevanceScorer>),
                None => Reranker::new(config),
            };
            let rt = runtime();
            let once = rt.block_on(reranker.rerank(&query, &docs)).unwrap();
            let twice = rt.block_on(reranker.rerank(&query, &once)).unwrap();

            if let (true, Some(top_k)) = (config.enabled, config.top_k) {
                prop_assert!(once.len() <= top_k);
            }
            let ids: HashSet<&str> = once.iter().map(|d| d.id.as_str()).collect();
            prop_assert_eq!(ids.len(), once.len());
            prop_assert_eq!(once, twice);
        }
    }
}

/// **Property 4: Prompt assembly is deterministic and complete**
/// *For any* query and ranked set, building the prompt twice SHALL give
/// byte-identical output that contains the query, every passage text, and
/// one numbered header per document (or the no-context marker when empty).
mod prop_prompt_deterministic {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn same_inputs_same_prompt(
            query in "[A-Za-z?]{1,20}",
            docs in proptest::collection::vec(arb_chunk(), 0..8),
        ) {
            let template = PromptTemplate::default();
            let set = RankedSet::from_ordered(docs);

            let first = template.build_prompt(&query, &set);
            let second = template.build_prompt(&query, &set);
            prop_assert_eq!(&first, &second);

            let text = first.as_str();
            let expected_question = format!("Question: {query}");
            prop_assert!(text.contains(&expected_question));
            if set.is_empty() {
                prop_assert!(text.contains(&template.no_context_marker));
            } else {
                prop_assert!(!text.contains(&template.no_context_marker));
                for (i, doc) in set.iter().enumerate() {
                    let header = format!("[{}] source: ", i + 1);
                    prop_assert!(text.contains(&header));
                    prop_assert!(text.contains(doc.text.trim_end()));
                }
            }
        }
    }
}

/// **Property 5: Disabled rewriting is the identity**
/// *For any* history and query, the passthrough rewriter SHALL return the
/// query unchanged.
mod prop_rewrite_identity {
    use super::*;

    fn arb_turn() -> impl Strategy<Value = ConversationTurn> {
        (any::<bool>(), ".{0,40}").prop_map(|(user, content)| {
            if user { ConversationTurn::user(content) } else { ConversationTurn::assistant(content) }
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn query_is_returned_unchanged(
            history in proptest::collection::vec(arb_turn(), 0..8),
            query in ".{1,60}",
        ) {
            let rewritten = runtime().block_on(PassthroughRewriter.rewrite(&history, &query));
            prop_assert_eq!(rewritten, query);
        }
    }
}
