//! Exam master data (the national exams and their curricula).
//!
//! Seeding is idempotent per exam: an exam whose code already exists is left
//! untouched, including its sections, subjects and topics.

use chrono::{DateTime, Utc};
use prep_core::model::{ExamDraft, ExamStatus, NodeDraft, ValidatedNode};
use thiserror::Error;
use tracing::{debug, info};

use crate::repository::{Storage, StorageError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SeedError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("invalid master data: {0}")]
    Invalid(#[from] prep_core::Error),
}

/// One level of the curriculum tree: a section, subject or topic.
#[derive(Debug)]
pub struct SeedNode {
    pub code: &'static str,
    pub name: &'static str,
    pub children: &'static [SeedNode],
}

#[derive(Debug)]
pub struct SeedExam {
    pub code: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub sections: &'static [SeedNode],
}

const fn node(
    code: &'static str,
    name: &'static str,
    children: &'static [SeedNode],
) -> SeedNode {
    SeedNode {
        code,
        name,
        children,
    }
}

const fn leaf(code: &'static str, name: &'static str) -> SeedNode {
    node(code, name, &[])
}

pub const MASTER_DATA: &[SeedExam] = &[
    SeedExam {
        code: "KPSS",
        name: "KPSS (Kamu Personeli Seçme Sınavı)",
        description: "Genel Yetenek, Genel Kültür, Eğitim Bilimleri",
        sections: &[
            node(
                "GENEL_YETENEK",
                "Genel Yetenek",
                &[
                    node(
                        "TURKCE",
                        "Türkçe",
                        &[
                            leaf("PARAGRAF", "Paragraf"),
                            leaf("DIL_BILGISI", "Dil Bilgisi"),
                            leaf("YAZIM_KURALLARI", "Yazım Kuralları"),
                        ],
                    ),
                    node(
                        "MATEMATIK",
                        "Matematik",
                        &[
                            leaf("PROBLEMLER", "Problemler"),
                            leaf("SAYISAL_MANTIK", "Sayısal Mantık"),
                        ],
                    ),
                    node("GEOMETRI", "Geometri", &[leaf("TEMEL_GEOMETRI", "Temel Geometri")]),
                ],
            ),
            node(
                "GENEL_KULTUR",
                "Genel Kültür",
                &[
                    node(
                        "TARIH",
                        "Tarih",
                        &[
                            leaf("ATATURK_ILKE_INKILAP", "Atatürk İlkeleri ve İnkılap Tarihi"),
                            leaf("TURKIYE_TARIHI", "Türkiye Tarihi"),
                        ],
                    ),
                    node(
                        "COGRAFYASI",
                        "Coğrafya",
                        &[leaf("TURKIYE_COGRAFYASI", "Türkiye Coğrafyası")],
                    ),
                    node(
                        "VATANDASLIK",
                        "Vatandaşlık",
                        &[
                            leaf("ANAYASA", "Anayasa"),
                            leaf("GUNCEL_BILGILER", "Güncel Bilgiler"),
                        ],
                    ),
                ],
            ),
        ],
    },
    SeedExam {
        code: "ALES",
        name: "ALES (Akademik Personel ve Lisansüstü Eğitimi Giriş Sınavı)",
        description: "Yüksek lisans ve doktora başvuruları için",
        sections: &[
            node(
                "SAYISAL",
                "Sayısal",
                &[
                    node("MATEMATIK", "Matematik", &[leaf("ALES_MATEMATIK", "Matematik")]),
                    node("GEOMETRI", "Geometri", &[leaf("ALES_GEOMETRI", "Geometri")]),
                ],
            ),
            node(
                "SOZEL",
                "Sözel",
                &[node(
                    "TURKCE",
                    "Türkçe",
                    &[
                        leaf("ALES_TURKCE", "Türkçe"),
                        leaf("ALES_SOZEL_MANTIK", "Sözel Mantık"),
                    ],
                )],
            ),
        ],
    },
    SeedExam {
        code: "DGS",
        name: "DGS (Dikey Geçiş Sınavı)",
        description: "Önlisans mezunlarının lisans tamamlaması için",
        sections: &[
            node(
                "SAYISAL_YETENEK",
                "Sayısal Yetenek",
                &[node("MATEMATIK", "Matematik", &[leaf("DGS_MATEMATIK", "Matematik")])],
            ),
            node(
                "SOZEL_YETENEK",
                "Sözel Yetenek",
                &[node("TURKCE", "Türkçe", &[leaf("DGS_TURKCE", "Türkçe")])],
            ),
        ],
    },
    SeedExam {
        code: "YKS_TYT",
        name: "YKS-TYT (Temel Yeterlilik Testi)",
        description: "Üniversiteye giriş birinci aşama sınavı",
        sections: &[
            node(
                "TURKCE",
                "Türkçe",
                &[node("TYT_TURKCE", "Türkçe", &[leaf("TYT_PARAGRAF", "Paragraf")])],
            ),
            leaf("SOSYAL_BILIMLER", "Sosyal Bilimler"),
            leaf("TEMEL_MATEMATIK", "Temel Matematik"),
            leaf("FEN_BILIMLERI", "Fen Bilimleri"),
        ],
    },
    SeedExam {
        code: "YKS_AYT",
        name: "YKS-AYT (Alan Yeterlilik Testi)",
        description: "Üniversiteye giriş ikinci aşama sınavı",
        sections: &[node(
            "MATEMATIK",
            "Matematik",
            &[node(
                "AYT_MATEMATIK",
                "Matematik",
                &[leaf("TUREV", "Türev"), leaf("INTEGRAL", "İntegral")],
            )],
        )],
    },
    SeedExam {
        code: "YKS_YDT",
        name: "YKS-YDT (Yabancı Dil Testi)",
        description: "Yabancı dil bölümleri için üniversite sınavı",
        sections: &[node(
            "INGILIZCE",
            "İngilizce",
            &[leaf("YDT_INGILIZCE", "İngilizce")],
        )],
    },
    SeedExam {
        code: "E_YDS",
        name: "e-YDS (Elektronik Yabancı Dil Bilgisi Seviye Tespit Sınavı)",
        description: "Yabancı dil yeterlilik sınavı",
        sections: &[node(
            "INGILIZCE",
            "İngilizce",
            &[node(
                "E_YDS_ENG",
                "İngilizce",
                &[
                    leaf("KELIME_BILGISI", "Kelime Bilgisi"),
                    leaf("DIL_BILGISI", "Dil Bilgisi"),
                ],
            )],
        )],
    },
    SeedExam {
        code: "YOKDIL",
        name: "YÖKDİL",
        description: "Yükseköğretim Kurumları Yabancı Dil Sınavı",
        sections: &[
            node(
                "SAGLIK_BILIMLERI",
                "Sağlık Bilimleri",
                &[node(
                    "YOKDIL_SB",
                    "Sağlık Bilimleri",
                    &[leaf("TIP_TERIMLERI", "Tıbbi Terimler")],
                )],
            ),
            leaf("SOSYAL_BILIMLER", "Sosyal Bilimler"),
            leaf("FEN_BILIMLERI", "Fen Bilimleri"),
        ],
    },
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub exams_created: u32,
    pub exams_skipped: u32,
    pub topics_created: u32,
}

fn validated(node: &SeedNode, position: usize) -> Result<ValidatedNode, SeedError> {
    let draft = NodeDraft {
        name: node.name.to_owned(),
        code: node.code.to_owned(),
        description: None,
        order: i64::try_from(position + 1).unwrap_or(i64::MAX),
    };
    draft
        .validate()
        .map_err(|e| SeedError::Invalid(e.into()))
}

/// Load `exams` into `storage`, skipping exams whose code already exists.
///
/// # Errors
///
/// Returns `SeedError` if a record fails validation or a write fails.
pub async fn seed_exams(
    storage: &Storage,
    exams: &[SeedExam],
    now: DateTime<Utc>,
) -> Result<SeedReport, SeedError> {
    let mut report = SeedReport::default();

    for seed in exams {
        if storage.exams.find_exam_by_code(seed.code).await?.is_some() {
            debug!(code = seed.code, "exam already present, skipping");
            report.exams_skipped += 1;
            continue;
        }

        let draft = ExamDraft {
            name: seed.name.to_owned(),
            code: seed.code.to_owned(),
            description: Some(seed.description.to_owned()),
            status: Some(ExamStatus::Active),
            start_date: None,
            end_date: None,
        };
        let validated_exam = draft.validate().map_err(|e| SeedError::Invalid(e.into()))?;
        let exam = storage.exams.insert_exam(&validated_exam, now).await?;

        for (i, section_seed) in seed.sections.iter().enumerate() {
            let section = storage
                .curriculum
                .insert_section(exam.id, &validated(section_seed, i)?, now)
                .await?;
            for (j, subject_seed) in section_seed.children.iter().enumerate() {
                let subject = storage
                    .curriculum
                    .insert_subject(section.id, &validated(subject_seed, j)?, now)
                    .await?;
                for (k, topic_seed) in subject_seed.children.iter().enumerate() {
                    storage
                        .curriculum
                        .insert_topic(subject.id, &validated(topic_seed, k)?, now)
                        .await?;
                    report.topics_created += 1;
                }
            }
        }

        info!(code = seed.code, exam_id = %exam.id, "seeded exam");
        report.exams_created += 1;
    }

    Ok(report)
}

/// Load the built-in [`MASTER_DATA`].
///
/// # Errors
///
/// Returns `SeedError` if a record fails validation or a write fails.
pub async fn seed_master_data(
    storage: &Storage,
    now: DateTime<Utc>,
) -> Result<SeedReport, SeedError> {
    seed_exams(storage, MASTER_DATA, now).await
}
