//! Amazon Bedrock Knowledge Base retriever

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_bedrockagentruntime::{
    error::DisplayErrorContext,
    types::{
        KnowledgeBaseQuery, KnowledgeBaseRetrievalConfiguration, KnowledgeBaseRetrievalResult,
        KnowledgeBaseVectorSearchConfiguration, RetrievalResultContent,
    },
    Client,
};
use tracing::debug;

use crate::retrieval::{Passage, RetrievalError, RetrievalResult, Retriever};

/// Vector search over one knowledge base
#[derive(Debug, Clone)]
pub struct KnowledgeBaseRetriever {
    client: Client,
    knowledge_base_id: String,
    number_of_results: i32,
}

impl KnowledgeBaseRetriever {
    pub fn new(client: Client, knowledge_base_id: impl Into<String>, number_of_results: i32) -> Self {
        Self {
            client,
            knowledge_base_id: knowledge_base_id.into(),
            number_of_results,
        }
    }

    pub fn from_config(
        sdk_config: &SdkConfig,
        knowledge_base_id: impl Into<String>,
        number_of_results: i32,
    ) -> Self {
        Self::new(Client::new(sdk_config), knowledge_base_id, number_of_results)
    }
}

#[async_trait]
impl Retriever for KnowledgeBaseRetriever {
    async fn retrieve(&self, query: &str) -> RetrievalResult<Vec<Passage>> {
        if query.trim().is_empty() {
            return Err(RetrievalError::InvalidQuery("query is empty".to_string()));
        }

        let (retrieval_query, configuration) = retrieval_request(query, self.number_of_results);

        let output = self
            .client
            .retrieve()
            .knowledge_base_id(&self.knowledge_base_id)
            .retrieval_query(retrieval_query)
            .retrieval_configuration(configuration)
            .send()
            .await
            .map_err(|e| RetrievalError::ApiError(DisplayErrorContext(&e).to_string()))?;

        let passages: Vec<Passage> = output
            .retrieval_results()
            .iter()
            .filter_map(passage_from_result)
            .collect();

        debug!(
            "Knowledge base {} returned {} passages",
            self.knowledge_base_id,
            passages.len()
        );

        Ok(passages)
    }

    fn name(&self) -> &str {
        "bedrock-knowledge-base"
    }
}

fn retrieval_request(
    query: &str,
    number_of_results: i32,
) -> (KnowledgeBaseQuery, KnowledgeBaseRetrievalConfiguration) {
    let retrieval_query = KnowledgeBaseQuery::builder().text(query).build();
    let configuration = KnowledgeBaseRetrievalConfiguration::builder()
        .vector_search_configuration(
            KnowledgeBaseVectorSearchConfiguration::builder()
                .number_of_results(number_of_results)
                .build(),
        )
        .build();
    (retrieval_query, configuration)
}

fn passage_from_result(result: &KnowledgeBaseRetrievalResult) -> Option<Passage> {
    // Optionality of these getters has shifted between SDK releases; `into`
    // accepts both the plain and the `Option` shape.
    let content: Option<&RetrievalResultContent> = result.content().into();
    let text: Option<&str> = content?.text().into();
    let text = text.filter(|text| !text.is_empty())?;

    let source = result
        .location()
        .and_then(|location| location.s3_location())
        .and_then(|s3| s3.uri())
        .map(str::to_string);

    Some(Passage {
        text: text.to_string(),
        source,
        score: result.score(),
    })
}
