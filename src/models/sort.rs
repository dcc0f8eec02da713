use phf::phf_map;
use serde::{Deserialize, Serialize};

/// 评论排序方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// 最新
    Newest,
    /// 评分最高
    Highest,
    /// 评分最低
    Lowest,
    /// 最相关（Google Maps 默认）
    Relevance,
}

/// 排序菜单中各语言的选项文字
static MENU_LABELS: phf::Map<&'static str, SortBy> = phf_map! {
    // newest
    "Newest" => SortBy::Newest,
    "החדשות ביותר" => SortBy::Newest,
    "ใหม่ที่สุด" => SortBy::Newest,
    "最新" => SortBy::Newest,
    "Más recientes" => SortBy::Newest,
    "最近" => SortBy::Newest,
    "Mais recentes" => SortBy::Newest,
    "Neueste" => SortBy::Newest,
    "Plus récent" => SortBy::Newest,
    "Più recenti" => SortBy::Newest,
    "Nyeste" => SortBy::Newest,
    "Новые" => SortBy::Newest,
    "Nieuwste" => SortBy::Newest,
    "جديد" => SortBy::Newest,
    "Uusimmat" => SortBy::Newest,
    "Najnowsze" => SortBy::Newest,
    "Senaste" => SortBy::Newest,
    "Terbaru" => SortBy::Newest,
    "Yakın zamanlı" => SortBy::Newest,
    "Mới nhất" => SortBy::Newest,
    "नवीनतम" => SortBy::Newest,
    // highest
    "Highest rating" => SortBy::Highest,
    "Top rating" => SortBy::Highest,
    "הדירוג הגבוה ביותר" => SortBy::Highest,
    "คะแนนสูงสุด" => SortBy::Highest,
    "最高評価" => SortBy::Highest,
    "Calificación más alta" => SortBy::Highest,
    "最高评分" => SortBy::Highest,
    "Melhor avaliação" => SortBy::Highest,
    "Höchste Bewertung" => SortBy::Highest,
    "Note la plus élevée" => SortBy::Highest,
    "Valutazione più alta" => SortBy::Highest,
    "Høyeste vurdering" => SortBy::Highest,
    "Наивысший рейтинг" => SortBy::Highest,
    "Hoogste waardering" => SortBy::Highest,
    "أعلى تقييم" => SortBy::Highest,
    "Højeste vurdering" => SortBy::Highest,
    "Korkein arvostelu" => SortBy::Highest,
    "Najwyższa ocena" => SortBy::Highest,
    "Högsta betyg" => SortBy::Highest,
    "Peringkat tertinggi" => SortBy::Highest,
    "En yüksek puan" => SortBy::Highest,
    "Đánh giá cao nhất" => SortBy::Highest,
    "उच्चतम रेटिंग" => SortBy::Highest,
    // lowest
    "Lowest rating" => SortBy::Lowest,
    "Worst rating" => SortBy::Lowest,
    "הדירוג הנמוך ביותר" => SortBy::Lowest,
    "คะแนนต่ำสุด" => SortBy::Lowest,
    "最低評価" => SortBy::Lowest,
    "Calificación más baja" => SortBy::Lowest,
    "最低评分" => SortBy::Lowest,
    "Pior avaliação" => SortBy::Lowest,
    "Niedrigste Bewertung" => SortBy::Lowest,
    "Note la plus basse" => SortBy::Lowest,
    "Valutazione più bassa" => SortBy::Lowest,
    "Laveste vurdering" => SortBy::Lowest,
    "Наименьший рейтинг" => SortBy::Lowest,
    "Laagste waardering" => SortBy::Lowest,
    "أقل تقييم" => SortBy::Lowest,
    "Alhaisin arvostelu" => SortBy::Lowest,
    "Najniższa ocena" => SortBy::Lowest,
    "Lägsta betyg" => SortBy::Lowest,
    "Peringkat terendah" => SortBy::Lowest,
    "En düşük puan" => SortBy::Lowest,
    "Đánh giá thấp nhất" => SortBy::Lowest,
    "निम्नतम रेटिंग" => SortBy::Lowest,
    // relevance
    "Most relevant" => SortBy::Relevance,
    "Relevance" => SortBy::Relevance,
    "רלוונטיות ביותר" => SortBy::Relevance,
    "เกี่ยวข้องมากที่สุด" => SortBy::Relevance,
    "関連性" => SortBy::Relevance,
    "Más relevantes" => SortBy::Relevance,
    "最相关" => SortBy::Relevance,
    "Mais relevantes" => SortBy::Relevance,
    "Relevanteste" => SortBy::Relevance,
    "Plus pertinents" => SortBy::Relevance,
    "Più pertinenti" => SortBy::Relevance,
    "Mest relevante" => SortBy::Relevance,
    "Наиболее релевантные" => SortBy::Relevance,
    "Meest relevant" => SortBy::Relevance,
    "الأكثر صلة" => SortBy::Relevance,
    "Olennaisimmat" => SortBy::Relevance,
    "Najbardziej trafne" => SortBy::Relevance,
    "Mest relevanta" => SortBy::Relevance,
    "Paling relevan" => SortBy::Relevance,
    "En alakalı" => SortBy::Relevance,
    "Liên quan nhất" => SortBy::Relevance,
    "सबसे प्रासंगिक" => SortBy::Relevance,
};

impl SortBy {
    pub fn as_str(self) -> &'static str {
        match self {
            SortBy::Newest => "newest",
            SortBy::Highest => "highest",
            SortBy::Lowest => "lowest",
            SortBy::Relevance => "relevance",
        }
    }

    /// 根据排序菜单项的文字识别排序方式
    pub fn from_menu_label(label: &str) -> Option<Self> {
        MENU_LABELS.get(label.trim()).copied()
    }

    /// 在菜单项列表中查找与当前排序方式对应的索引
    pub fn position_in(self, labels: &[String]) -> Option<usize> {
        labels
            .iter()
            .position(|label| Self::from_menu_label(label) == Some(self))
    }
}

impl std::fmt::Display for SortBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_label_lookup() {
        assert_eq!(SortBy::from_menu_label("Newest"), Some(SortBy::Newest));
        assert_eq!(SortBy::from_menu_label("  最低评分 "), Some(SortBy::Lowest));
        assert_eq!(SortBy::from_menu_label("Neueste"), Some(SortBy::Newest));
        assert_eq!(SortBy::from_menu_label("Unknown"), None);
    }

    #[test]
    fn test_position_in_menu() {
        let labels = vec![
            "Most relevant".to_string(),
            "Newest".to_string(),
            "Highest rating".to_string(),
            "Lowest rating".to_string(),
        ];
        assert_eq!(SortBy::Newest.position_in(&labels), Some(1));
        assert_eq!(SortBy::Lowest.position_in(&labels), Some(3));
        assert_eq!(SortBy::Highest.position_in(&labels[..2]), None);
    }

    #[test]
    fn test_serde_lowercase() {
        let sort: SortBy = serde_json::from_str("\"highest\"").unwrap();
        assert_eq!(sort, SortBy::Highest);
        assert_eq!(serde_json::to_string(&SortBy::Relevance).unwrap(), "\"relevance\"");
    }
}
