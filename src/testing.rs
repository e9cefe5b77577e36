//! Builders for listing pages used across the test modules.

use std::fmt::Write;

#[derive(Clone, Debug)]
pub struct Row {
    pub rank: String,
    pub external_id: String,
    pub detail_url: Option<String>,
    pub title: String,
    pub rating: String,
    pub meta: String,
    pub credits: String,
}

impl Row {
    pub fn new(rank: u16, external_id: &str) -> Self {
        Self {
            rank: rank.to_string(),
            external_id: external_id.to_string(),
            detail_url: Some(format!("https://movie.douban.com/subject/{external_id}/")),
            title: format!("电影{rank}"),
            rating: "9.0".to_string(),
            meta: "1999 / 美国 / 剧情 科幻".to_string(),
            credits: "导演: 导演甲 Director A 主演: 演员乙 Actor B / 演员丙 Actor C".to_string(),
        }
    }

    pub fn with_genres(mut self, genres: &str) -> Self {
        self.meta = format!("1999 / 美国 / {genres}");
        self
    }
}

pub fn listing_html(rows: &[Row]) -> String {
    let mut items = String::new();
    for row in rows {
        let href = row.detail_url.as_deref().map(|u| format!(" href=\"{u}\"")).unwrap_or_default();
        write!(
            items,
            r#"<li><div class="item">
  <div class="pic"><em>{rank}</em><a{href}><img src="https://img.example/{id}.webp"></a></div>
  <div class="info">
    <div class="hd"><a{href}><span class="title">{title}</span></a></div>
    <div class="bd">
      <p>{credits}<br>{meta}</p>
      <div class="star"><span class="rating_num">{rating}</span><span>1234人评价</span></div>
    </div>
  </div>
</div></li>"#,
            rank = row.rank,
            id = row.external_id,
            title = row.title,
            credits = row.credits,
            meta = row.meta,
            rating = row.rating,
        )
        .expect("writing to a String");
    }
    format!(r#"<html><body><ol class="grid_view">{items}</ol></body></html>"#)
}

/// A full page of `count` valid rows starting at `first_rank`; external ids
/// are derived from the rank.
pub fn page_of(first_rank: u16, count: u16) -> String {
    let rows: Vec<Row> = (first_rank..first_rank + count)
        .map(|rank| Row::new(rank, &format!("{}", 1_000_000 + u32::from(rank))))
        .collect();
    listing_html(&rows)
}
