use std::fmt;
use std::str::FromStr;

use tantivy::schema::{Field, IndexRecordOption, NumericOptions, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, NgramTokenizer, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

use passagedb_core::error::Error;

pub const STOPWORD_TOKENIZER: &str = "text_with_stopwords";
pub const NGRAM_TOKENIZER: &str = "text_ngram";

const STOP_WORDS: &[&str] = &[
	"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
];

/// Tokenization applied to the `content` field, fixed when the index is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Analyzer {
	/// Word tokens, lowercased, English stop words removed.
	#[default]
	Standard,
	/// Lowercased character 2-3 grams; works for text without word separators (CJK).
	Ngram,
}

impl Analyzer {
	pub fn tokenizer_name(self) -> &'static str {
		match self {
			Analyzer::Standard => STOPWORD_TOKENIZER,
			Analyzer::Ngram => NGRAM_TOKENIZER,
		}
	}
}

impl FromStr for Analyzer {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"standard" | "english" => Ok(Analyzer::Standard),
			"ngram" => Ok(Analyzer::Ngram),
			other => Err(Error::validation(format!("unknown analyzer '{other}' (expected standard or ngram)"))),
		}
	}
}

impl fmt::Display for Analyzer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Analyzer::Standard => "standard",
			Analyzer::Ngram => "ngram",
		})
	}
}

#[derive(Debug, Clone, Copy)]
pub struct LexicalFields {
	pub id: Field,
	pub article_name: Field,
	pub content: Field,
}

impl LexicalFields {
	pub fn from_schema(schema: &Schema) -> tantivy::Result<Self> {
		Ok(Self {
			id: schema.get_field("id")?,
			article_name: schema.get_field("article_name")?,
			content: schema.get_field("content")?,
		})
	}
}

pub fn build_schema(analyzer: Analyzer) -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_i64_field("id", NumericOptions::default().set_indexed().set_stored().set_fast());
	schema_builder.add_text_field("article_name", STRING | STORED);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(analyzer.tokenizer_name()).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing).set_stored();
	schema_builder.add_text_field("content", text_options);
	schema_builder.build()
}

/// Registers every analyzer on `index`; the schema picks one by name.
pub fn register_tokenizers(index: &Index) -> tantivy::Result<()> {
	let stopwords = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| s.to_string())))
		.build();
	index.tokenizers().register(STOPWORD_TOKENIZER, stopwords);
	let ngram = TextAnalyzer::builder(NgramTokenizer::new(2, 3, false)?).filter(LowerCaser).build();
	index.tokenizers().register(NGRAM_TOKENIZER, ngram);
	Ok(())
}
