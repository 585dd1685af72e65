use std::io::{self, Write};

pub fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        if io::stdin().read_line(&mut input)? == 0 {
            // stdin closed: nothing more will come, treat as a refusal
            return Ok(default.unwrap_or(false));
        }

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}

/// Ask before deleting `count` trashed files.
pub fn confirm_deletion(count: usize) -> io::Result<bool> {
    let prompt = if count == 1 {
        "Confirm deleting this file/folder?".to_string()
    } else {
        format!("Confirm deleting these {} files/folders?", count)
    };
    prompt_confirm(&prompt, None)
}
