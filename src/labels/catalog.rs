//! Built-in sign metadata.
//!
//! One entry per class the bundled model knows about, keyed by the raw
//! label the classifier vocabulary uses. The text is the child-friendly
//! Indonesian copy shown to the user.

use std::collections::HashMap;

use anyhow::{anyhow, Result};

use super::LabelVocabulary;

/// Display metadata for one sign class.
///
/// Records are built once from the static table and never mutated; only
/// read accessors are exposed.
///
/// ```compile_fail
/// use sign_classifier::SignRecord;
///
/// let mut record = SignRecord::new("Stop", "Berhenti", "Berhenti total.");
/// record.localized_name = String::from("Jalan");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignRecord {
    raw_label: String,
    localized_name: String,
    explanation: String,
}

impl SignRecord {
    pub fn new(
        raw_label: impl Into<String>,
        localized_name: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            raw_label: raw_label.into(),
            localized_name: localized_name.into(),
            explanation: explanation.into(),
        }
    }

    pub fn raw_label(&self) -> &str {
        &self.raw_label
    }

    pub fn localized_name(&self) -> &str {
        &self.localized_name
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }
}

struct SignEntry {
    raw_label: &'static str,
    localized_name: &'static str,
    explanation: &'static str,
}

/// Number of classes in the built-in table.
pub const BUILTIN_SIGN_COUNT: usize = 43;

const SIGN_TABLE: [SignEntry; BUILTIN_SIGN_COUNT] = [
    SignEntry {
        raw_label: "Speed limit (20km/h)",
        localized_name: "Batas Kecepatan 20 km/j",
        explanation: "Artinya, mobil di sini jalannya harus pelan-pelan, seperti kura-kura! Tidak boleh lebih cepat dari angka 20.",
    },
    SignEntry {
        raw_label: "Speed limit (30km/h)",
        localized_name: "Batas Kecepatan 30 km/j",
        explanation: "Di jalan ini, mobil boleh sedikit lebih cepat, tapi tetap pelan ya, maksimal di angka 30.",
    },
    SignEntry {
        raw_label: "Speed limit (50km/h)",
        localized_name: "Batas Kecepatan 50 km/j",
        explanation: "Ini batas kecepatan di kota. Mobil harus melaju santai, tidak boleh melebihi angka 50.",
    },
    SignEntry {
        raw_label: "Speed limit (60km/h)",
        localized_name: "Batas Kecepatan 60 km/j",
        explanation: "Kecepatan mobil di sini maksimal 60 ya. Tidak terlalu cepat, tidak terlalu pelan.",
    },
    SignEntry {
        raw_label: "Speed limit (70km/h)",
        localized_name: "Batas Kecepatan 70 km/j",
        explanation: "Mobil boleh sedikit ngebut, tapi jangan sampai melewati angka 70 ya!",
    },
    SignEntry {
        raw_label: "Speed limit (80km/h)",
        localized_name: "Batas Kecepatan 80 km/j",
        explanation: "Ini adalah batas kecepatan di jalan yang lebih besar. Maksimal di angka 80.",
    },
    SignEntry {
        raw_label: "End of speed limit (80km/h)",
        localized_name: "Akhir Batas Kecepatan 80 km/j",
        explanation: "Hore! Batas kecepatan 80 sudah selesai. Sekarang mobil boleh jalan dengan kecepatan normal lagi.",
    },
    SignEntry {
        raw_label: "Speed limit (100km/h)",
        localized_name: "Batas Kecepatan 100 km/j",
        explanation: "Wiuussh! Ini jalan tol, mobil boleh melaju cepat sampai angka 100.",
    },
    SignEntry {
        raw_label: "Speed limit (120km/h)",
        localized_name: "Batas Kecepatan 120 km/j",
        explanation: "Super cepat! Ini kecepatan maksimal di jalan tol, sampai angka 120. Seru!",
    },
    SignEntry {
        raw_label: "No passing",
        localized_name: "Dilarang Menyalip",
        explanation: "Hore, tidak boleh balapan! Mobil harus tetap di belakang teman di depannya, tidak boleh menyalip.",
    },
    SignEntry {
        raw_label: "No passing for vehicles over 3.5 tons",
        localized_name: "Truk Dilarang Menyalip",
        explanation: "Truk besar yang berat tidak boleh menyalip mobil lain di sini.",
    },
    SignEntry {
        raw_label: "Right-of-way at the next intersection",
        localized_name: "Dahulukan dari Arah Berlawanan",
        explanation: "Di persimpangan depan, kamu dapat giliran jalan duluan! Tapi tetap hati-hati ya.",
    },
    SignEntry {
        raw_label: "Priority road",
        localized_name: "Jalan Utama",
        explanation: "Kamu ada di jalan raja! Mobil dari jalan kecil harus menunggu kamu lewat dulu. Hebat, kan?",
    },
    SignEntry {
        raw_label: "Yield",
        localized_name: "Wajib Beri Jalan",
        explanation: "Lihat! Ada teman mau lewat. Kita kasih jalan dulu ya, supaya semua aman dan tidak tabrakan.",
    },
    SignEntry {
        raw_label: "Stop",
        localized_name: "Berhenti",
        explanation: "Berhenti! Seperti main patung, semua mobil harus berhenti total. Lihat kanan dan kiri, kalau sudah aman baru boleh jalan lagi.",
    },
    SignEntry {
        raw_label: "No vehicles",
        localized_name: "Kendaraan Dilarang Masuk",
        explanation: "Ups, semua mobil, motor, dan truk tidak boleh lewat jalan ini.",
    },
    SignEntry {
        raw_label: "Vehicles over 3.5 tons prohibited",
        localized_name: "Truk Dilarang Masuk",
        explanation: "Truk besar dilarang masuk ke jalan ini, mungkin karena jalannya sempit.",
    },
    SignEntry {
        raw_label: "No entry",
        localized_name: "Dilarang Masuk",
        explanation: "Eits, tidak boleh masuk! Ini jalan terlarang. Kalau masuk nanti bisa salah jalan atau bertemu mobil dari depan.",
    },
    SignEntry {
        raw_label: "General caution",
        localized_name: "Peringatan Hati-Hati",
        explanation: "Awas, hati-hati! Ada sesuatu di depan. Kurangi kecepatan dan lihat baik-baik ya.",
    },
    SignEntry {
        raw_label: "Dangerous curve to the left",
        localized_name: "Tikungan Tajam ke Kiri",
        explanation: "Ada tikungan tajam ke kiri di depan. Pegangan yang erat!",
    },
    SignEntry {
        raw_label: "Dangerous curve to the right",
        localized_name: "Tikungan Tajam ke Kanan",
        explanation: "Siap-siap, di depan ada tikungan tajam ke kanan!",
    },
    SignEntry {
        raw_label: "Double curve",
        localized_name: "Tikungan Ganda",
        explanation: "Wow, ada dua tikungan berturut-turut! Belok pertama, lalu belok lagi. Seru!",
    },
    SignEntry {
        raw_label: "Bumpy road",
        localized_name: "Jalan Bergelombang",
        explanation: "Jalannya tidak rata! Siap-siap, mobil akan sedikit bergoyang seperti naik kuda. Pegangan ya!",
    },
    SignEntry {
        raw_label: "Slippery road",
        localized_name: "Jalan Licin",
        explanation: "Hati-hati, jalannya licin! Apalagi kalau hujan, mobil harus jalan pelan-pelan agar tidak tergelincir.",
    },
    SignEntry {
        raw_label: "Road narrows on the right",
        localized_name: "Jalan Menyempit di Kanan",
        explanation: "Jalannya menyempit di sebelah kanan. Mobil-mobil harus sedikit merapat.",
    },
    SignEntry {
        raw_label: "Road work",
        localized_name: "Ada Perbaikan Jalan",
        explanation: "Ada kakak-kakak pekerja sedang memperbaiki jalan. Kita jalan pelan-pelan ya agar tidak mengganggu mereka.",
    },
    SignEntry {
        raw_label: "Traffic signals",
        localized_name: "Lampu Lalu Lintas",
        explanation: "Lihat, ada lampu lalu lintas di depan! Perhatikan warnanya ya, merah berhenti, kuning hati-hati, hijau jalan.",
    },
    SignEntry {
        raw_label: "Pedestrians",
        localized_name: "Hati-Hati Pejalan Kaki",
        explanation: "Ini tempat orang menyeberang jalan. Mobil harus berhenti dan mempersilakan mereka lewat dulu.",
    },
    SignEntry {
        raw_label: "Children crossing",
        localized_name: "Hati-Hati Anak-Anak",
        explanation: "Hati-hati! Di sini banyak anak-anak menyeberang, jadi semua mobil harus super pelan.",
    },
    SignEntry {
        raw_label: "Bicycles crossing",
        localized_name: "Hati-Hati Sepeda",
        explanation: "Banyak sepeda akan lewat di sini. Kasih jalan untuk para pengendara sepeda ya.",
    },
    SignEntry {
        raw_label: "Beware of ice/snow",
        localized_name: "Waspada Jalan Bersalju/Es",
        explanation: "Brrr, dingin! Jalannya bisa ada es atau salju dan jadi sangat licin. Hati-hati!",
    },
    SignEntry {
        raw_label: "Wild animals crossing",
        localized_name: "Hati-Hati Hewan Liar",
        explanation: "Awas! Mungkin ada hewan seperti rusa atau kancil yang mau menyeberang jalan. Pelan-pelan ya.",
    },
    SignEntry {
        raw_label: "End of all speed and passing limits",
        localized_name: "Akhir Semua Batasan",
        explanation: "Bebas! Semua aturan kecepatan dan larangan menyalip sudah selesai. Kembali ke aturan normal.",
    },
    SignEntry {
        raw_label: "Turn right ahead",
        localized_name: "Wajib Belok Kanan",
        explanation: "Di depan, semua mobil harus belok ke kanan ya.",
    },
    SignEntry {
        raw_label: "Turn left ahead",
        localized_name: "Wajib Belok Kiri",
        explanation: "Semuanya siap-siap! Di depan kita harus belok ke kiri.",
    },
    SignEntry {
        raw_label: "Ahead only",
        localized_name: "Wajib Lurus",
        explanation: "Lurus terus! Di sini tidak boleh belok kanan atau kiri.",
    },
    SignEntry {
        raw_label: "Ahead or right",
        localized_name: "Boleh Lurus atau Kanan",
        explanation: "Kamu punya dua pilihan: boleh jalan lurus atau belok ke kanan.",
    },
    SignEntry {
        raw_label: "Ahead or left",
        localized_name: "Boleh Lurus atau Kiri",
        explanation: "Di sini, kamu boleh memilih untuk jalan lurus atau belok ke kiri.",
    },
    SignEntry {
        raw_label: "Keep right",
        localized_name: "Tetap di Kanan",
        explanation: "Ayo, semua mobil harus tetap berjalan di lajur sebelah kanan.",
    },
    SignEntry {
        raw_label: "Keep left",
        localized_name: "Tetap di Kiri",
        explanation: "Semua mobil harus ambil lajur sebelah kiri ya.",
    },
    SignEntry {
        raw_label: "Roundabout mandatory",
        localized_name: "Wajib Ikut Bundaran",
        explanation: "Waktunya berputar! Ikuti jalan di bundaran ini dengan hati-hati.",
    },
    SignEntry {
        raw_label: "End of no passing",
        localized_name: "Akhir Dilarang Menyalip",
        explanation: "Asiik! Sekarang mobil boleh menyalip lagi kalau aman.",
    },
    SignEntry {
        raw_label: "End of no passing by vehicles over 3.5 tons",
        localized_name: "Akhir Truk Dilarang Menyalip",
        explanation: "Larangan menyalip untuk truk besar sudah selesai.",
    },
];

/// Lookup table from raw classifier label to display metadata.
#[derive(Clone, Debug, Default)]
pub struct SignCatalog {
    records: HashMap<String, SignRecord>,
}

impl SignCatalog {
    /// Catalog with the 43 built-in sign classes.
    pub fn builtin() -> Self {
        Self::from_records(SIGN_TABLE.iter().map(|entry| {
            SignRecord::new(entry.raw_label, entry.localized_name, entry.explanation)
        }))
    }

    /// Build a catalog from arbitrary records. Later duplicates replace earlier ones.
    pub fn from_records(records: impl IntoIterator<Item = SignRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.raw_label.clone(), record))
            .collect();
        Self { records }
    }

    pub fn lookup(&self, raw_label: &str) -> Option<&SignRecord> {
        self.records.get(raw_label)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ensure every vocabulary entry has a record.
    ///
    /// All missing labels are reported in a single error so a mismatched
    /// asset pair can be fixed in one pass.
    pub fn validate_vocabulary(&self, vocabulary: &LabelVocabulary) -> Result<()> {
        let missing: Vec<&str> = vocabulary
            .iter()
            .filter(|label| !self.records.contains_key(*label))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(anyhow!(
            "label vocabulary has {} entr{} without sign metadata: {}",
            missing.len(),
            if missing.len() == 1 { "y" } else { "ies" },
            missing.join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_has_every_class() {
        let catalog = SignCatalog::builtin();
        assert_eq!(catalog.len(), BUILTIN_SIGN_COUNT);
    }

    #[test]
    fn stop_sign_maps_to_berhenti() {
        let catalog = SignCatalog::builtin();
        let record = catalog.lookup("Stop").expect("stop record");
        assert_eq!(record.localized_name(), "Berhenti");
        assert!(record.explanation().starts_with("Berhenti!"));
    }

    #[test]
    fn unknown_label_is_absent() {
        let catalog = SignCatalog::builtin();
        assert!(catalog.lookup("stop").is_none());
        assert!(catalog.lookup("").is_none());
    }

    #[test]
    fn validate_reports_all_missing_labels() {
        let catalog = SignCatalog::from_records([SignRecord::new("Stop", "Berhenti", "...")]);
        let vocabulary =
            LabelVocabulary::new(vec!["Stop".into(), "Yield".into(), "Keep left".into()]).unwrap();
        let err = catalog.validate_vocabulary(&vocabulary).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("2 entries"));
        assert!(msg.contains("Yield"));
        assert!(msg.contains("Keep left"));
    }
}
