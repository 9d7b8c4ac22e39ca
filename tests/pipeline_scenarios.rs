mod support;

use support::fixtures::{review_rows, to_csv, write_encoded, write_utf8_bom};
use support::sentrain_env::SentrainEnvGuard;

use sentrain::classifier::{ClassifierBackend, NaiveBayesBackend};
use sentrain::config::{IngestSettings, Settings};
use sentrain::corpus::{NeutralStrategy, Sentiment, TrainingCorpus};
use sentrain::evaluate::{Evaluator, NeutralScoring};
use sentrain::ingest::{
    DELIMITER_CANDIDATES, IngestError, Ingestor, LabelClass, LabelVocabulary, LabeledDataset,
    TextEncoding,
};
use sentrain::install::{InstallPhase, ModelSlot};
use sentrain::pipeline::{PipelineEvent, TrainPipeline, TrainRequest};
use sentrain::registry::ModelRegistry;
use sentrain::training::TrainingSession;
use tempfile::tempdir;

const SMALL_TABLE: &str =
    "content,sentiment\n\"好\",positive\n\"差\",negative\n\"\",positive\n\"一般\",neutral\n";

fn small_dataset() -> LabeledDataset {
    Ingestor::default().from_bytes(SMALL_TABLE.as_bytes()).unwrap()
}

#[test]
fn unregistered_headers_raise_missing_column() {
    let data = "a,b\n\"食物很好\",1\n\"服务很差\",0\n,1\n\"还行\",2\n";
    let err = Ingestor::default().from_bytes(data.as_bytes()).unwrap_err();
    assert!(matches!(err, IngestError::MissingRequiredColumn { .. }), "{err}");
}

#[test]
fn exclude_keeps_only_polar_rows() {
    let dataset = small_dataset();
    assert_eq!(dataset.skipped_row_count, 1);

    let corpus = TrainingCorpus::from_labeled(&dataset.examples, &NeutralStrategy::Exclude).unwrap();

    assert_eq!(corpus.len(), 2);
    assert_eq!(corpus.positive_count(), 1);
    assert_eq!(corpus.negative_count(), 1);
    assert_eq!(corpus.redistribution().neutral_dropped, 1);
}

#[test]
fn force_positive_relabels_the_neutral_row() {
    let dataset = small_dataset();

    let corpus =
        TrainingCorpus::from_labeled(&dataset.examples, &NeutralStrategy::ForcePositive).unwrap();

    assert_eq!(corpus.len(), 3);
    assert_eq!(corpus.positive_count(), 2);
    assert_eq!(corpus.negative_count(), 1);
    let relabeled = corpus
        .examples()
        .iter()
        .find(|example| example.content == "一般")
        .unwrap();
    assert_eq!(relabeled.sentiment, Sentiment::Positive);
}

#[test]
fn every_strategy_yields_a_binary_corpus() {
    let mut table = String::from("text,label\n");
    for idx in 0..12 {
        table.push_str(&format!("pos {idx},好\nneg {idx},差\nmid {idx},中性\nodd {idx},??\n"));
    }
    let dataset = Ingestor::default().from_bytes(table.as_bytes()).unwrap();
    let strategies = [
        NeutralStrategy::Exclude,
        NeutralStrategy::AutoBalance,
        NeutralStrategy::ForcePositive,
        NeutralStrategy::ForceNegative,
        NeutralStrategy::Random { seed: 3 },
        NeutralStrategy::Split {
            positive_share: 0.25,
            seed: 3,
        },
    ];
    for strategy in strategies {
        let corpus = TrainingCorpus::from_labeled(&dataset.examples, &strategy).unwrap();
        assert!(!corpus.is_empty(), "{strategy}");
        assert!(
            corpus.examples().iter().all(|example| !example.content.starts_with("odd")),
            "{strategy} kept an invalid row"
        );
        let summary = corpus.redistribution();
        assert_eq!(summary.invalid_dropped, 12, "{strategy}");
        match strategy {
            NeutralStrategy::ForcePositive => assert_eq!(summary.neutral_to_negative, 0),
            NeutralStrategy::ForceNegative => assert_eq!(summary.neutral_to_positive, 0),
            _ => {}
        }
    }
}

#[test]
fn random_strategy_is_deterministic_for_a_seed() {
    let mut table = String::from("content,sentiment\n");
    for idx in 0..50 {
        table.push_str(&format!("neutral text {idx},neutral\n"));
    }
    table.push_str("good,1\nbad,0\n");
    let dataset = Ingestor::default().from_bytes(table.as_bytes()).unwrap();
    let strategy = NeutralStrategy::Random { seed: 11 };

    let first = TrainingCorpus::from_labeled(&dataset.examples, &strategy).unwrap();
    let second = TrainingCorpus::from_labeled(&dataset.examples, &strategy).unwrap();

    assert_eq!(first.examples(), second.examples());
    assert!(first.positive_count() > 1 && first.negative_count() > 1);
}

#[test]
fn clean_labels_score_at_least_as_well_as_flipped_ones() {
    let rows = review_rows(60);
    let flipped: Vec<(String, &str)> = rows
        .iter()
        .enumerate()
        .map(|(idx, (content, label))| {
            let label = match (idx % 10 < 3, *label) {
                (true, "positive") => "negative",
                (true, _) => "positive",
                (false, label) => label,
            };
            (content.clone(), label)
        })
        .collect();

    let accuracy = |table: String| {
        let dataset = Ingestor::default().from_bytes(table.as_bytes()).unwrap();
        let backend = NaiveBayesBackend::new();
        let corpus = TrainingCorpus::from_labeled(&dataset.examples, &NeutralStrategy::Exclude).unwrap();
        let artifact = TrainingSession::new(&backend).run(corpus).unwrap();
        let model = backend.decode(artifact.as_bytes()).unwrap();
        Evaluator::new(&model, NeutralScoring::Redistribute(NeutralStrategy::Exclude))
            .evaluate(&dataset)
            .unwrap()
            .accuracy
    };

    let clean = accuracy(to_csv(&rows));
    let noisy = accuracy(to_csv(&flipped));
    assert!(clean >= noisy, "clean {clean} < noisy {noisy}");
    assert!(clean > 0.9, "clean accuracy {clean}");
}

#[test]
fn detects_legacy_encodings_bom_and_delimiters_with_aliases() {
    let dir = tempdir().unwrap();
    let gbk = dir.path().join("gbk.tsv");
    let bom = dir.path().join("bom.csv");
    let piped = dir.path().join("piped.txt");
    write_encoded(&gbk, "评论\t情感\n质量很好\t正面\n太差了\t负面\n", encoding_rs::GBK);
    write_utf8_bom(&bom, "文本;标签\n很喜欢;1\n不喜欢;0\n");
    std::fs::write(&piped, "review|class\nlove it|good\nhate it|bad\n").unwrap();

    let ingestor = Ingestor::default();
    let dataset = ingestor.load_many(&[&gbk, &bom, &piped]).unwrap();

    let formats: Vec<_> = dataset.sources.iter().map(|source| source.format).collect();
    assert_eq!(formats[0].encoding, TextEncoding::Legacy(encoding_rs::GBK));
    assert_eq!(formats[0].delimiter, b'\t');
    assert_eq!(formats[1].encoding, TextEncoding::Utf8Bom);
    assert_eq!(formats[1].delimiter, b';');
    assert_eq!(formats[2].encoding, TextEncoding::Utf8);
    assert_eq!(formats[2].delimiter, b'|');
    assert_eq!(dataset.examples[0].content, "质量很好");
    assert_eq!(dataset.examples[0].class, LabelClass::Positive);
    assert_eq!(dataset.examples[2].content, "很喜欢");
    assert!(dataset.sources.iter().all(|source| !source.had_decode_errors));
    assert_eq!(dataset.invalid_label_count(), 0);
}

struct EncodedTable {
    legacy: &'static [&'static str],
    text: &'static str,
    /// `None` writes UTF-8.
    writer: Option<&'static encoding_rs::Encoding>,
    bom: bool,
    expected: TextEncoding,
}

const ENCODED_TABLES: &[EncodedTable] = &[
    EncodedTable {
        legacy: &["gbk"],
        text: "质量很好",
        writer: None,
        bom: false,
        expected: TextEncoding::Utf8,
    },
    EncodedTable {
        legacy: &["gbk"],
        text: "质量很好",
        writer: None,
        bom: true,
        expected: TextEncoding::Utf8Bom,
    },
    EncodedTable {
        legacy: &["gbk"],
        text: "质量很好",
        writer: Some(encoding_rs::GBK),
        bom: false,
        expected: TextEncoding::Legacy(encoding_rs::GBK),
    },
    // Four-byte GB18030 sequences go through the GBK decoder.
    EncodedTable {
        legacy: &["gbk"],
        text: "质量很好𠀀",
        writer: Some(encoding_rs::GB18030),
        bom: false,
        expected: TextEncoding::Legacy(encoding_rs::GBK),
    },
    EncodedTable {
        legacy: &["big5", "gbk"],
        text: "非常滿意",
        writer: Some(encoding_rs::BIG5),
        bom: false,
        expected: TextEncoding::Legacy(encoding_rs::BIG5),
    },
    EncodedTable {
        legacy: &["shift_jis", "gbk"],
        text: "とても良い",
        writer: Some(encoding_rs::SHIFT_JIS),
        bom: false,
        expected: TextEncoding::Legacy(encoding_rs::SHIFT_JIS),
    },
    EncodedTable {
        legacy: &["euc-kr", "gbk"],
        text: "정말 좋아요",
        writer: Some(encoding_rs::EUC_KR),
        bom: false,
        expected: TextEncoding::Legacy(encoding_rs::EUC_KR),
    },
];

const HEADER_ALIASES: [(&str, &str); 4] = [
    ("content", "sentiment"),
    ("text", "label"),
    ("review", "class"),
    ("Comment", "Label"),
];

#[test]
fn every_encoding_and_delimiter_is_detected_with_aliased_headers() {
    for case in ENCODED_TABLES {
        let settings = IngestSettings {
            legacy_encodings: case.legacy.iter().map(|label| label.to_string()).collect(),
            ..IngestSettings::default()
        };
        let ingestor = Ingestor::new(settings, LabelVocabulary::builtin());
        for (idx, &delimiter) in DELIMITER_CANDIDATES.iter().enumerate() {
            let (content_header, label_header) = HEADER_ALIASES[idx % HEADER_ALIASES.len()];
            let d = delimiter as char;
            let table = format!(
                "{content_header}{d}{label_header}\n{}{d}positive\nbad{d}negative\n",
                case.text
            );
            let mut bytes = if case.bom { vec![0xEF, 0xBB, 0xBF] } else { Vec::new() };
            match case.writer {
                Some(encoding) => {
                    let (encoded, _, had_errors) = encoding.encode(&table);
                    assert!(!had_errors, "{} cannot encode {}", encoding.name(), case.text);
                    bytes.extend_from_slice(&encoded);
                }
                None => bytes.extend_from_slice(table.as_bytes()),
            }
            let context = format!("{} with {:?}", case.expected.name(), d);

            let dataset = ingestor.from_bytes(&bytes).unwrap();

            let format = dataset.sources[0].format;
            assert_eq!(format.encoding, case.expected, "{context}");
            assert_eq!(format.delimiter, delimiter, "{context}");
            assert!(!dataset.sources[0].had_decode_errors, "{context}");
            assert_eq!(dataset.examples[0].content, case.text, "{context}");
            assert_eq!(dataset.examples[0].class, LabelClass::Positive, "{context}");
            assert_eq!(dataset.examples[1].class, LabelClass::Negative, "{context}");
        }
    }
}

#[test]
fn default_settings_only_try_the_gb_family() {
    let bytes = encoding_rs::EUC_KR.encode("content,sentiment\n정말 좋아요,positive\n").0;
    let dataset = Ingestor::default().from_bytes(&bytes).unwrap();
    // Korean bytes are valid GBK; narrower encodings must be configured ahead of it.
    assert_eq!(
        dataset.sources[0].format.encoding,
        TextEncoding::Legacy(encoding_rs::GBK)
    );
    assert_eq!(IngestSettings::default().legacy_encodings, vec!["gbk".to_string()]);
}

#[test]
fn big5_is_detected_when_configured() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("big5.csv");
    write_encoded(&path, "content,sentiment\n非常滿意,正面\n服務太慢,負面\n", encoding_rs::BIG5);
    let settings = IngestSettings {
        legacy_encodings: vec!["big5".to_string()],
        ..IngestSettings::default()
    };

    let dataset = Ingestor::new(settings, LabelVocabulary::builtin()).load(&path).unwrap();

    assert_eq!(dataset.sources[0].format.encoding, TextEncoding::Legacy(encoding_rs::BIG5));
    assert_eq!(dataset.examples[0].content, "非常滿意");
    assert_eq!(dataset.examples[0].class, LabelClass::Positive);
    // Traditional-script labels outside the vocabulary stay invalid.
    assert_eq!(dataset.examples[1].class, LabelClass::Invalid);
}

#[test]
fn train_command_flow_uses_the_app_root() {
    let temp = tempdir().unwrap();
    let _env = SentrainEnvGuard::set_config_home(temp.path().join("config"));
    let csv = temp.path().join("reviews.csv");
    std::fs::write(&csv, to_csv(&review_rows(30))).unwrap();
    let settings = Settings::default();
    let slot_path = sentrain::config::model_slot_path(&settings).unwrap();
    let registry = ModelRegistry::open_default().unwrap();
    let backend = NaiveBayesBackend::new();
    let mut slot = ModelSlot::new(slot_path.clone());
    let mut committed = false;

    let report = TrainPipeline::new(&settings, &backend)
        .with_registry(&registry)
        .run(
            &mut slot,
            &TrainRequest {
                files: vec![csv],
                ..TrainRequest::default()
            },
            |event| {
                if event == PipelineEvent::Install(InstallPhase::Committed) {
                    committed = true;
                }
            },
        )
        .unwrap();

    assert!(committed);
    assert!(slot_path.starts_with(temp.path().join("config")));
    assert!(backend.load(&slot_path).is_ok());
    let history = registry.list().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(Some(&history[0]), report.history.as_ref());
    assert!(history[0].snapshot_path.starts_with(sentrain::app_dirs::history_dir().unwrap()));
}
