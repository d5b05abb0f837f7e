use super::*;

// ============================================================================
// Shader stages
// ============================================================================

#[test]
fn test_check_stages_accepts_vertex_then_fragment() {
    assert!(check_stages(ShaderStage::Vertex, ShaderStage::Fragment).is_ok());
}

#[test]
fn test_check_stages_rejects_swapped_shaders() {
    let result = check_stages(ShaderStage::Fragment, ShaderStage::Vertex);
    assert!(matches!(result, Err(Error::InvalidState(_))));

    let result = check_stages(ShaderStage::Vertex, ShaderStage::Vertex);
    assert!(matches!(result, Err(Error::InvalidState(_))));
}
