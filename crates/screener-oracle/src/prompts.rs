//! Prompt text sent to the chat model

use std::fmt::Write;

use screener_pipeline::WorkItem;

pub const ANALYST_SYSTEM: &str = "You are a professional equity analyst skilled in technical \
and fundamental analysis. Follow the requested output format exactly.";

fn header(item: &WorkItem) -> String {
    match &item.name {
        Some(name) => format!("{} ({name})", item.id),
        None => item.id.clone(),
    }
}

fn indicator_block(item: &WorkItem) -> String {
    let mut block = String::new();
    for (key, value) in &item.fields {
        let _ = writeln!(block, "- {key}: {value}");
    }
    if block.is_empty() {
        block.push_str("- (no indicators supplied)\n");
    }
    block
}

pub fn rating_prompt(item: &WorkItem) -> String {
    format!(
        "Score stock {} from 0 to 100 using the latest indicators below.\n\n\
         {}\n\
         Weigh trend certainty (45%), entry timing (40%) and risk (15%).\n\
         A score of 75 or more means buy, 60 to 74 hold, below 60 sell.\n\n\
         Answer in exactly six lines:\n\
         1: the score as a bare number\n\
         2: trend analysis\n\
         3: entry timing and fundamentals\n\
         4: trade advice (position size, entry range, stop loss, target)\n\
         5: risk warning\n\
         6: one word: buy, hold or sell\n",
        header(item),
        indicator_block(item)
    )
}

pub fn analysis_prompt(item: &WorkItem) -> String {
    format!(
        "Write an in-depth analysis of stock {}.\n\n\
         {}\n\
         Answer on a single line with five sections separated by '|', in this order:\n\
         technical analysis|fundamental analysis|news sentiment|trade advice|risk warning\n\
         No section may be empty or contain '|'. Quote prices to two decimals.\n",
        header(item),
        indicator_block(item)
    )
}

pub fn sentiment_prompt(item_id: &str) -> String {
    format!(
        "Summarize the news sentiment for stock {item_id} over the last seven days: \
         overall mood (positive, negative or neutral), key events and likely short-term \
         impact. If you have no information, answer exactly: sentiment unavailable"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_prompt_lists_fields_in_key_order() {
        let item = WorkItem::new("600519")
            .with_name("Moutai")
            .with_number("RSI_6", 28.456)
            .with_number("MA_5", 1502.1);
        let p = rating_prompt(&item);
        assert!(p.contains("600519 (Moutai)"));
        let ma = p.find("- MA_5: 1502.10").unwrap();
        let rsi = p.find("- RSI_6: 28.46").unwrap();
        assert!(ma < rsi);
        assert!(p.contains("exactly six lines"));
    }

    #[test]
    fn empty_payload_is_stated() {
        let p = analysis_prompt(&WorkItem::new("000001"));
        assert!(p.contains("no indicators supplied"));
        assert!(p.contains("technical analysis|fundamental analysis"));
    }

    #[test]
    fn sentiment_prompt_names_sentinel() {
        assert!(sentiment_prompt("000001").ends_with("sentiment unavailable"));
    }
}
