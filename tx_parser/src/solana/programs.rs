use super::types::Instruction;

pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const TOKEN_2022_PROGRAM_ID: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PTnBBQ7cNAbJiDc";
pub const STAKE_PROGRAM_ID: &str = "Stake11111111111111111111111111111111111111";
pub const VOTE_PROGRAM_ID: &str = "Vote111111111111111111111111111111111111111";

/// What an instruction means to the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionKind {
    NativeTransfer,
    TokenTransfer,
    Staking,
    Voting,
    Other,
}

fn is_program(ix: &Instruction, name: &str, id: &str) -> bool {
    ix.program.as_deref() == Some(name) || ix.program_id.as_deref() == Some(id)
}

pub fn classify_instruction(ix: &Instruction) -> InstructionKind {
    let op = ix.parsed_type().unwrap_or_default();

    if is_program(ix, "system", SYSTEM_PROGRAM_ID) {
        return match op {
            "transfer" | "transferWithSeed" => InstructionKind::NativeTransfer,
            _ => InstructionKind::Other,
        };
    }

    if is_program(ix, "spl-token", TOKEN_PROGRAM_ID)
        || is_program(ix, "spl-token-2022", TOKEN_2022_PROGRAM_ID)
    {
        return match op {
            "transfer" | "transferChecked" => InstructionKind::TokenTransfer,
            _ => InstructionKind::Other,
        };
    }

    if is_program(ix, "stake", STAKE_PROGRAM_ID) {
        return InstructionKind::Staking;
    }
    if is_program(ix, "vote", VOTE_PROGRAM_ID) {
        return InstructionKind::Voting;
    }

    InstructionKind::Other
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ix(value: serde_json::Value) -> Instruction {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_classify_by_name_or_id() {
        let by_name = ix(json!({"program": "system", "parsed": {"type": "transfer", "info": {}}}));
        assert_eq!(classify_instruction(&by_name), InstructionKind::NativeTransfer);

        let by_id = ix(json!({
            "programId": TOKEN_2022_PROGRAM_ID,
            "parsed": {"type": "transferChecked", "info": {}}
        }));
        assert_eq!(classify_instruction(&by_id), InstructionKind::TokenTransfer);

        let stake = ix(json!({"programId": STAKE_PROGRAM_ID, "parsed": {"type": "delegate"}}));
        assert_eq!(classify_instruction(&stake), InstructionKind::Staking);
    }

    #[test]
    fn test_non_transfer_ops_are_other() {
        let create = ix(json!({"program": "system", "parsed": {"type": "createAccount"}}));
        assert_eq!(classify_instruction(&create), InstructionKind::Other);

        let close = ix(json!({"program": "spl-token", "parsed": {"type": "closeAccount"}}));
        assert_eq!(classify_instruction(&close), InstructionKind::Other);
    }
}
