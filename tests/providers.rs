//! HTTP contracts of the GitHub, Gemini, OpenAI and Ollama clients,
//! checked against `wiremock` servers.

use base64::Engine;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use repo_qa::config::{EmbeddingConfig, GenerationConfig, GitHubConfig};
use repo_qa::connector_github::GitHubTree;
use repo_qa::embedding::{OllamaEmbedder, OpenAIEmbedder};
use repo_qa::generation::{GeminiGenerator, OllamaGenerator, OpenAIGenerator};
use repo_qa_core::answer::Generator;
use repo_qa_core::embedding::Embedder;
use repo_qa_core::ingest::{FileEntry, FileTreeProvider, TreeEntry};

fn github_config(server: &MockServer) -> GitHubConfig {
    GitHubConfig {
        api_url: server.uri(),
        ..GitHubConfig::default()
    }
}

fn wrapped_base64(text: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(text);
    // The contents API wraps at 60 columns.
    encoded
        .as_bytes()
        .chunks(60)
        .map(|c| String::from_utf8_lossy(c).to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

// ============ GitHub ============

#[tokio::test]
async fn test_github_lists_directory() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/contents"))
        .and(header("authorization", "Bearer gh-token"))
        .and(header("accept", "application/vnd.github+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"type": "file", "name": "README.md", "path": "README.md", "size": 42},
            {"type": "dir", "name": "src", "path": "src", "size": 0},
            {"type": "symlink", "name": "latest", "path": "latest", "size": 6},
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let tree = GitHubTree::with_token(&github_config(&server), "gh-token").unwrap();
    let entries = tree.list("octo/hello", "").await.unwrap();

    assert_eq!(
        entries,
        vec![
            TreeEntry::File(FileEntry {
                path: "README.md".to_string(),
                name: "README.md".to_string(),
                size: 42,
            }),
            TreeEntry::Dir {
                path: "src".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn test_github_fetch_decodes_wrapped_base64() {
    let text = "# Hello\n\nA repository used in tests. ".repeat(5);
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/contents/docs/intro.md"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "file",
            "encoding": "base64",
            "content": wrapped_base64(&text),
        })))
        .mount(&server)
        .await;

    let tree = GitHubTree::with_token(&github_config(&server), "gh-token").unwrap();
    let file = FileEntry {
        path: "docs/intro.md".to_string(),
        name: "intro.md".to_string(),
        size: text.len() as u64,
    };
    let bytes = tree.fetch("octo/hello", &file).await.unwrap();
    assert_eq!(String::from_utf8(bytes).unwrap(), text);
}

#[tokio::test]
async fn test_github_paths_with_reserved_characters() {
    let text = "# C# notes\n\nPattern matching on records.";
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/contents/docs/C%23"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"type": "file", "name": "intro.md", "path": "docs/C#/intro.md", "size": 44},
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/contents/docs/C%23/intro.md"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "file",
            "encoding": "base64",
            "content": wrapped_base64(text),
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tree = GitHubTree::with_token(&github_config(&server), "gh-token").unwrap();
    let entries = tree.list("octo/hello", "docs/C#").await.unwrap();
    let file = match entries.as_slice() {
        [TreeEntry::File(file)] => file.clone(),
        other => panic!("unexpected listing: {other:?}"),
    };
    assert_eq!(file.path, "docs/C#/intro.md");

    let bytes = tree.fetch("octo/hello", &file).await.unwrap();
    assert_eq!(String::from_utf8(bytes).unwrap(), text);
}

#[tokio::test]
async fn test_github_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/missing/contents"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})),
        )
        .mount(&server)
        .await;

    let tree = GitHubTree::with_token(&github_config(&server), "gh-token").unwrap();
    let err = tree.list("octo/missing", "").await.unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_github_requires_token() {
    let config = GitHubConfig {
        token_env: "REPO_QA_TEST_TOKEN_THAT_IS_NEVER_SET".to_string(),
        ..GitHubConfig::default()
    };
    let err = GitHubTree::new(&config).err().unwrap();
    assert!(err.to_string().contains("REPO_QA_TEST_TOKEN_THAT_IS_NEVER_SET"));
}

// ============ Gemini ============

fn generation_config(server: &MockServer) -> GenerationConfig {
    GenerationConfig {
        url: Some(server.uri()),
        timeout_secs: 5,
        ..GenerationConfig::default()
    }
}

#[tokio::test]
async fn test_gemini_generate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro-latest:generateContent"))
        .and(header("x-goog-api-key", "gem-key"))
        .and(body_partial_json(json!({
            "contents": [{"parts": [{"text": "Question: where?"}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [{"text": "In `src/main.rs`."}], "role": "model"}
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let generator = GeminiGenerator::with_api_key(&generation_config(&server), "gem-key").unwrap();
    assert_eq!(
        generator.generate("Question: where?").await.unwrap(),
        "In `src/main.rs`."
    );
}

#[tokio::test]
async fn test_gemini_error_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exhausted"))
        .expect(1)
        .mount(&server)
        .await;

    let generator = GeminiGenerator::with_api_key(&generation_config(&server), "gem-key").unwrap();
    let err = generator.generate("hi").await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("429"), "{msg}");
    assert!(msg.contains("quota exhausted"), "{msg}");
}

#[tokio::test]
async fn test_generation_timeout_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"response": "late"}))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = GenerationConfig {
        provider: "ollama".to_string(),
        url: Some(server.uri()),
        timeout_secs: 1,
        ..GenerationConfig::default()
    };
    let generator = OllamaGenerator::new(&config).unwrap();
    assert!(generator.generate("hi").await.is_err());
}

// ============ OpenAI ============

#[tokio::test]
async fn test_openai_chat_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer oa-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": "You are a helpful AI assistant."},
                {"role": "user", "content": "prompt text"},
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "answer text"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = GenerationConfig {
        provider: "openai".to_string(),
        ..generation_config(&server)
    };
    let generator = OpenAIGenerator::with_api_key(&config, "oa-key").unwrap();
    assert_eq!(generator.generate("prompt text").await.unwrap(), "answer text");
}

/// Answers an embeddings request with one `[n, 1.0]` vector per input,
/// `n` being the input's position across all requests.
struct CountingEmbeddings;

impl Respond for CountingEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        let inputs = body["input"].as_array().unwrap();
        // Reverse order to exercise index-based reordering.
        let data: Vec<_> = inputs
            .iter()
            .enumerate()
            .rev()
            .map(|(i, text)| {
                let n: f32 = text.as_str().unwrap().parse().unwrap();
                json!({"index": i, "embedding": [n, 1.0]})
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
    }
}

#[tokio::test]
async fn test_openai_embeddings_are_sub_batched_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("authorization", "Bearer oa-key"))
        .respond_with(CountingEmbeddings)
        .expect(3)
        .mount(&server)
        .await;

    let config = EmbeddingConfig {
        provider: "openai".to_string(),
        model: Some("text-embedding-3-small".to_string()),
        dims: Some(2),
        url: Some(server.uri()),
        batch_size: 2,
        ..EmbeddingConfig::default()
    };
    let embedder = OpenAIEmbedder::with_api_key(&config, "oa-key").unwrap();
    let texts: Vec<String> = (0..5).map(|i| i.to_string()).collect();
    let vectors = embedder.embed(&texts).await.unwrap();

    let firsts: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
    assert_eq!(firsts, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
}

// ============ Ollama ============

#[tokio::test]
async fn test_ollama_embed_and_generate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({"model": "nomic-embed-text"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.1, 0.2, 0.3]]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({"model": "llama3.2", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "local answer", "done": true
        })))
        .mount(&server)
        .await;

    let embed_config = EmbeddingConfig {
        provider: "ollama".to_string(),
        model: Some("nomic-embed-text".to_string()),
        dims: Some(3),
        url: Some(server.uri()),
        ..EmbeddingConfig::default()
    };
    let embedder = OllamaEmbedder::new(&embed_config).unwrap();
    assert_eq!(
        embedder.embed_one("hello").await.unwrap(),
        vec![0.1, 0.2, 0.3]
    );

    let gen_config = GenerationConfig {
        provider: "ollama".to_string(),
        ..generation_config(&server)
    };
    let generator = OllamaGenerator::new(&gen_config).unwrap();
    assert_eq!(generator.generate("hi").await.unwrap(), "local answer");
}
